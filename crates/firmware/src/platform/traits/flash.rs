//! Flash interface trait
//!
//! This module defines the word-granular Flash interface that the settings
//! store is built on. It is the only seam between the store and the hardware.

use crate::platform::Result;

/// Flash interface trait
///
/// Platform implementations must provide this interface for word read,
/// word program and block erase.
///
/// # Flash Characteristics
///
/// - Flash is organized in erase blocks (4 KB on RP2350)
/// - Erase sets every word in the block to 0xFFFFFFFF
/// - A word may be programmed once after erase (program-only-once discipline)
/// - All addressing is in 4-byte words; words are little-endian
/// - Operations are blocking and can take 100ms+ for an erase
///
/// # Safety Invariants
///
/// - Only one owner per Flash instance (no concurrent access)
/// - Must not erase/program the firmware region (implementations validate addresses)
/// - Callers hold an interrupt-free section around program and erase
///
/// # Memory Layout (RP2350)
///
/// ```text
/// [Firmware]           0x000000 - 0x040000 (256 KB) - DO NOT WRITE
/// [Settings Region A]  0x040000 - 0x042000 (8 KB)
/// [Settings Region B]  0x042000 - 0x044000 (8 KB)
/// ```
pub trait FlashInterface {
    /// Read one word
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::Flash(FlashError::Misaligned)` if `address` is not word aligned.
    /// Returns `PlatformError::Flash(FlashError::InvalidAddress)` if address is out of bounds.
    fn read_word(&mut self, address: u32) -> Result<u32>;

    /// Program one word
    ///
    /// # Important
    ///
    /// - The target word must be erased (0xFFFFFFFF)
    /// - Programming is not abortable once started
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::Flash(FlashError::NotErased)` if the word was already programmed.
    /// Returns `PlatformError::Flash(FlashError::InvalidAddress)` if address is protected or out of bounds.
    /// Returns `PlatformError::Flash(FlashError::WriteFailed)` if the program operation fails.
    fn program_word(&mut self, address: u32, word: u32) -> Result<()>;

    /// Erase Flash region
    ///
    /// Erases `size` bytes starting at `address`, setting every word to 0xFFFFFFFF.
    ///
    /// # Important
    ///
    /// - Address and size must be aligned to the block size
    /// - Erase can take 100ms+ (blocking operation)
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::Flash(FlashError::Misaligned)` if address or size is not block aligned.
    /// Returns `PlatformError::Flash(FlashError::InvalidAddress)` if the range is protected or out of bounds.
    /// Returns `PlatformError::Flash(FlashError::EraseFailed)` if the erase operation fails.
    fn erase(&mut self, address: u32, size: u32) -> Result<()>;

    /// Get Flash block size
    ///
    /// Returns the minimum erasable unit size (4096 bytes on RP2350).
    fn block_size(&self) -> u32;

    /// Get total Flash size
    ///
    /// Returns the total Flash capacity in bytes.
    fn capacity(&self) -> u32;
}
