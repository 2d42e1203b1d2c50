//! RP2350 Flash implementation
//!
//! This module provides word-granular Flash storage for RP2350 using ROM functions.
//!
//! # Flash Layout
//!
//! ```text
//! [Firmware]           0x000000 - 0x040000 (256 KB) - PROTECTED
//! [Settings Region A]  0x040000 - 0x042000 (8 KB)
//! [Settings Region B]  0x042000 - 0x044000 (8 KB)
//! [Unused]             0x044000 - 0x400000
//! ```
//!
//! # Word Programming
//!
//! The ROM only programs whole 256-byte pages. A single word is programmed by
//! sending a page image that is 0xFF everywhere except the target word: NOR
//! programming can only clear bits, so the 0xFF bytes leave the rest of the
//! page untouched.
//!
//! # Safety
//!
//! Flash operations use unsafe ROM functions and must:
//! - Disable interrupts during operations (XIP inaccessible)
//! - Not access XIP memory during erase/write
//! - Validate addresses are not in firmware region

use crate::platform::{error::FlashError, traits::FlashInterface, Result};
use delta_control_core::settings::{ERASED_WORD, WORD_SIZE};
use rp235x_hal::rom_data;

/// Minimum firmware size (protect first 256 KB)
const FIRMWARE_SIZE: u32 = 0x40000; // 256 KB

/// Flash block size (minimum erase unit)
const BLOCK_SIZE: u32 = 4096; // 4 KB

/// Flash page size (minimum program unit of the ROM routine)
const PAGE_SIZE: usize = 256;

/// Flash sector erase command (0x20 for 4KB sector)
const SECTOR_ERASE_CMD: u8 = 0x20;

/// Total Flash capacity for Pico 2 W
const FLASH_CAPACITY: u32 = 4 * 1024 * 1024; // 4 MB

/// Flash is memory-mapped at this XIP address
const XIP_BASE: usize = 0x10000000;

/// RP2350 Flash implementation
///
/// # Important
///
/// - Flash operations are blocking (an erase can take 100ms+)
/// - XIP is inaccessible during erase/program (other core will fault)
/// - Firmware region (0x000000-0x03FFFF) is protected from writes
///
/// # Example
///
/// ```no_run
/// use delta_control_firmware::platform::rp2350::Rp2350Flash;
/// use delta_control_firmware::platform::traits::FlashInterface;
///
/// let mut flash = Rp2350Flash::new();
///
/// flash.erase(0x040000, 4096).unwrap();
/// flash.program_word(0x040000, 0xDEADBEEF).unwrap();
/// assert_eq!(flash.read_word(0x040000).unwrap(), 0xDEADBEEF);
/// ```
pub struct Rp2350Flash;

impl Rp2350Flash {
    /// Create a new RP2350 Flash instance
    pub fn new() -> Self {
        Self
    }

    /// Check if address is in writable region (not firmware)
    fn is_writable(&self, address: u32) -> bool {
        (FIRMWARE_SIZE..FLASH_CAPACITY).contains(&address)
    }

    /// Validate a word address for access
    fn check_word(&self, address: u32) -> Result<()> {
        if !address.is_multiple_of(WORD_SIZE) {
            return Err(FlashError::Misaligned.into());
        }

        if address >= FLASH_CAPACITY {
            return Err(FlashError::InvalidAddress.into());
        }

        Ok(())
    }

    /// Execute Flash operation with XIP disabled
    ///
    /// # Safety
    ///
    /// - Interrupts are disabled during operation
    /// - XIP is inaccessible (other core will fault if accessing Flash)
    /// - Must not access XIP memory in the closure
    unsafe fn with_xip_disabled<F, R>(&mut self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        // SAFETY: Use critical section to prevent interrupts during Flash operation.
        // XIP is disabled and any interrupt executing from Flash would fault.
        cortex_m::interrupt::free(|_cs| {
            // SAFETY: Prepare Flash for serial operations
            rom_data::connect_internal_flash();
            rom_data::flash_exit_xip();

            let result = f();

            // SAFETY: Flush cache to make changes visible
            rom_data::flash_flush_cache();

            // SAFETY: Restore XIP mode for normal operation
            rom_data::flash_enter_cmd_xip();

            result
        })
    }
}

impl Default for Rp2350Flash {
    fn default() -> Self {
        Self::new()
    }
}

impl FlashInterface for Rp2350Flash {
    fn read_word(&mut self, address: u32) -> Result<u32> {
        self.check_word(address)?;

        let flash_ptr = (XIP_BASE + address as usize) as *const u32;

        // SAFETY: Address is word aligned and inside the mapped Flash window
        Ok(unsafe { core::ptr::read_volatile(flash_ptr) })
    }

    fn program_word(&mut self, address: u32, word: u32) -> Result<()> {
        self.check_word(address)?;

        // Validate address is in writable region
        if !self.is_writable(address) {
            return Err(FlashError::InvalidAddress.into());
        }

        if self.read_word(address)? != ERASED_WORD {
            return Err(FlashError::NotErased.into());
        }

        let page_base = address & !(PAGE_SIZE as u32 - 1);
        let offset = (address - page_base) as usize;

        // Page image: only the target word clears bits
        let mut page = [0xFFu8; PAGE_SIZE];
        page[offset..offset + WORD_SIZE as usize].copy_from_slice(&word.to_le_bytes());

        // SAFETY: Execute Flash program with XIP disabled. The page image lives
        // on the stack (RAM), not in XIP memory.
        unsafe {
            self.with_xip_disabled(|| {
                rom_data::flash_range_program(page_base, page.as_ptr(), PAGE_SIZE);
            });
        }

        if self.read_word(address)? != word {
            return Err(FlashError::WriteFailed.into());
        }

        Ok(())
    }

    fn erase(&mut self, address: u32, size: u32) -> Result<()> {
        // Validate address is in writable region
        if !self.is_writable(address) {
            return Err(FlashError::InvalidAddress.into());
        }

        // Validate address and size are block-aligned
        if !address.is_multiple_of(BLOCK_SIZE) || !size.is_multiple_of(BLOCK_SIZE) {
            return Err(FlashError::Misaligned.into());
        }

        // Validate erase doesn't exceed Flash capacity
        if address
            .checked_add(size)
            .is_none_or(|end| end > FLASH_CAPACITY)
        {
            return Err(FlashError::InvalidAddress.into());
        }

        // SAFETY: Execute Flash erase with XIP disabled
        unsafe {
            self.with_xip_disabled(|| {
                // block_size: 4096 (use sector erase), block_cmd: 0x20
                rom_data::flash_range_erase(address, size as usize, BLOCK_SIZE, SECTOR_ERASE_CMD);
            });
        }

        // Spot-check the first word of the range
        if self.read_word(address)? != ERASED_WORD {
            return Err(FlashError::EraseFailed.into());
        }

        Ok(())
    }

    fn block_size(&self) -> u32 {
        BLOCK_SIZE
    }

    fn capacity(&self) -> u32 {
        FLASH_CAPACITY
    }
}
