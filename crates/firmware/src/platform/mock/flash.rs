//! Mock Flash implementation for testing
//!
//! Provides in-memory word-programmable Flash simulation for unit tests.

use crate::platform::{error::FlashError, traits::FlashInterface, Result};
use delta_control_core::settings::{ERASED_WORD, WORD_SIZE};
use std::vec;
use std::vec::Vec;

/// Flash block size (4 KB)
const BLOCK_SIZE: u32 = 4096;

/// Flash capacity (4 MB, same as Pico 2 W)
const FLASH_CAPACITY: u32 = 4 * 1024 * 1024;

/// Minimum firmware size (protect first 256 KB)
const FIRMWARE_SIZE: u32 = 0x40000;

/// Mock Flash implementation
///
/// Simulates NOR Flash in memory for testing. Supports:
/// - Word read/program and block erase with program-only-once enforcement
/// - Corruption injection for testing error handling
/// - Erase count tracking for wear leveling validation
/// - Program/erase operation counters for write-amplification checks
/// - Power-loss simulation for reliability testing
///
/// # Example
///
/// ```
/// use delta_control_firmware::platform::mock::MockFlash;
/// use delta_control_firmware::platform::traits::FlashInterface;
///
/// let mut flash = MockFlash::new();
///
/// // Erase a block
/// flash.erase(0x040000, 4096).unwrap();
///
/// // Program the region marker
/// flash.program_word(0x040000, 0xDEADBEEF).unwrap();
///
/// // Read back
/// assert_eq!(flash.read_word(0x040000).unwrap(), 0xDEADBEEF);
///
/// // Check erase count
/// assert_eq!(flash.get_erase_count(0x040000), 1);
/// ```
#[derive(Debug, Clone)]
pub struct MockFlash {
    /// Flash storage (initialized to 0xFF - erased state)
    storage: Vec<u8>,
    /// Erase count per block (for wear leveling testing)
    erase_counts: Vec<u32>,
    /// Erase block size in bytes
    block_size: u32,
    /// Protected bytes at the start of Flash
    protected: u32,
    /// Successful word programs since creation
    programs: u32,
    /// Remaining program/erase operations before simulated power loss
    power_budget: Option<u32>,
}

impl MockFlash {
    /// Create a new mock Flash instance with Pico 2 W geometry
    ///
    /// The first 256 KB are protected as the firmware image.
    pub fn new() -> Self {
        let mut flash = Self::with_geometry(FLASH_CAPACITY, BLOCK_SIZE);
        flash.protected = FIRMWARE_SIZE;
        flash
    }

    /// Create a small mock Flash with custom geometry and no protected area
    ///
    /// `capacity` must be a multiple of `block_size`, which must be a multiple
    /// of the word size.
    pub fn with_geometry(capacity: u32, block_size: u32) -> Self {
        debug_assert!(block_size.is_multiple_of(WORD_SIZE) && block_size > 0);
        debug_assert!(capacity.is_multiple_of(block_size));

        let storage = vec![0xFF; capacity as usize];
        let block_count = (capacity / block_size) as usize;
        let erase_counts = vec![0; block_count];

        Self {
            storage,
            erase_counts,
            block_size,
            protected: 0,
            programs: 0,
            power_budget: None,
        }
    }

    /// Get Flash contents (for test verification)
    pub fn get_contents(&self, address: u32, len: usize) -> Vec<u8> {
        self.storage[address as usize..(address as usize + len)].to_vec()
    }

    /// Inject corruption at address (for testing error recovery)
    ///
    /// Overwrites bytes with a fixed pattern, ignoring program rules.
    pub fn inject_corruption(&mut self, address: u32, len: usize) {
        for byte in &mut self.storage[address as usize..address as usize + len] {
            *byte = 0xAA; // Corrupt pattern
        }
    }

    /// Store a raw word, ignoring program rules (for staging legacy images)
    pub fn poke_word(&mut self, address: u32, word: u32) {
        let start = address as usize;
        self.storage[start..start + WORD_SIZE as usize].copy_from_slice(&word.to_le_bytes());
    }

    /// Get erase count for a block (for wear leveling validation)
    ///
    /// Returns the number of times a block has been erased.
    pub fn get_erase_count(&self, address: u32) -> u32 {
        let block_id = (address / self.block_size) as usize;
        self.erase_counts[block_id]
    }

    /// Get total erase count across all blocks
    pub fn get_total_erase_count(&self) -> u32 {
        self.erase_counts.iter().sum()
    }

    /// Number of successful word programs
    pub fn program_count(&self) -> u32 {
        self.programs
    }

    /// Simulate power loss after `operations` more program/erase operations
    ///
    /// Every later program or erase fails with `FlashError::PowerLoss` and
    /// leaves Flash untouched, until `restore_power` is called.
    pub fn cut_power_after(&mut self, operations: u32) {
        self.power_budget = Some(operations);
    }

    /// Restore power after a simulated loss
    pub fn restore_power(&mut self) {
        self.power_budget = None;
    }

    /// Consume one operation from the power budget
    fn draw_power(&mut self) -> Result<()> {
        match self.power_budget {
            Some(0) => Err(FlashError::PowerLoss.into()),
            Some(ref mut remaining) => {
                *remaining -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Check if address is in writable region
    fn is_writable(&self, address: u32) -> bool {
        (self.protected..self.capacity()).contains(&address)
    }

    /// Validate a word address for access
    fn check_word(&self, address: u32) -> Result<usize> {
        if !address.is_multiple_of(WORD_SIZE) {
            return Err(FlashError::Misaligned.into());
        }

        if address >= self.capacity() {
            return Err(FlashError::InvalidAddress.into());
        }

        Ok(address as usize)
    }

    fn word_at(&self, offset: usize) -> u32 {
        let mut bytes = [0u8; WORD_SIZE as usize];
        bytes.copy_from_slice(&self.storage[offset..offset + WORD_SIZE as usize]);
        u32::from_le_bytes(bytes)
    }
}

impl Default for MockFlash {
    fn default() -> Self {
        Self::new()
    }
}

impl FlashInterface for MockFlash {
    fn read_word(&mut self, address: u32) -> Result<u32> {
        let offset = self.check_word(address)?;
        Ok(self.word_at(offset))
    }

    fn program_word(&mut self, address: u32, word: u32) -> Result<()> {
        let offset = self.check_word(address)?;

        // Validate address is in writable region
        if !self.is_writable(address) {
            return Err(FlashError::InvalidAddress.into());
        }

        // Program-only-once: the word must still be erased
        if self.word_at(offset) != ERASED_WORD {
            return Err(FlashError::NotErased.into());
        }

        self.draw_power()?;

        self.storage[offset..offset + WORD_SIZE as usize].copy_from_slice(&word.to_le_bytes());
        self.programs += 1;

        Ok(())
    }

    fn erase(&mut self, address: u32, size: u32) -> Result<()> {
        // Validate address is in writable region
        if !self.is_writable(address) {
            return Err(FlashError::InvalidAddress.into());
        }

        // Validate address and size are block-aligned
        if !address.is_multiple_of(self.block_size) || !size.is_multiple_of(self.block_size) {
            return Err(FlashError::Misaligned.into());
        }

        // Validate erase doesn't exceed capacity
        if address
            .checked_add(size)
            .is_none_or(|end| end > self.capacity())
        {
            return Err(FlashError::InvalidAddress.into());
        }

        self.draw_power()?;

        // Erase blocks (set to 0xFF)
        for byte in &mut self.storage[address as usize..(address + size) as usize] {
            *byte = 0xFF;
        }

        // Update erase counts
        let start_block = (address / self.block_size) as usize;
        let block_count = (size / self.block_size) as usize;
        for count in &mut self.erase_counts[start_block..start_block + block_count] {
            *count += 1;
        }

        Ok(())
    }

    fn block_size(&self) -> u32 {
        self.block_size
    }

    fn capacity(&self) -> u32 {
        self.storage.len() as u32
    }
}
