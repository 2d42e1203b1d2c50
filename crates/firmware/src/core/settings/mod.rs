//! Flash-backed settings store
//!
//! A log-structured key/value store built directly on word-programmable
//! Flash. Core types (`Region`, `EntryHeader`, `StorageError`, ...) are
//! defined in `delta_control_core::settings`.
//!
//! # Components
//!
//! - [`scanner`]: walks a region's entries, finds the append cursor and
//!   resolves the latest version of a key through successor links
//! - [`lifecycle`]: active-region tracking, format, boot probing and
//!   migration (compaction into the spare region)
//! - [`store`]: the public `upsert`/`fetch` engine
//!
//! # Write Ordering
//!
//! Replacing a value programs the old entry's successor link first, then the
//! new entry's payload, then its info word. The info word is the commit
//! point: a torn entry never shows a valid header, and `init()` repairs any
//! dangling link or leftover payload by migrating the live data.

pub mod lifecycle;
pub mod scanner;
pub mod store;

pub use delta_control_core::settings::{
    Region, RegionId, RegionLayout, RegionRole, StorageError, StoreStats, DEFAULT_LAYOUT,
};
pub use lifecycle::{BootOutcome, RegionLifecycle, StoreState};
pub use scanner::{EntryRef, RegionAudit, RegionScanner};
pub use store::SettingsStore;

use crate::platform::{FlashError, FlashInterface, PlatformError};

/// Map a device error at `address` into the store's error taxonomy
pub(crate) fn device_error(address: u32, error: PlatformError) -> StorageError {
    match error {
        PlatformError::Flash(FlashError::NotErased) => StorageError::ProgramViolation { address },
        _ => StorageError::Device { address },
    }
}

/// Read one word, mapping device errors
pub(crate) fn read_word<F: FlashInterface>(flash: &mut F, address: u32) -> Result<u32, StorageError> {
    flash
        .read_word(address)
        .map_err(|e| device_error(address, e))
}

/// Program one word, mapping device errors
pub(crate) fn program_word<F: FlashInterface>(
    flash: &mut F,
    address: u32,
    word: u32,
) -> Result<(), StorageError> {
    flash
        .program_word(address, word)
        .map_err(|e| device_error(address, e))
}

/// Erase a whole region, mapping device errors
pub(crate) fn erase_region<F: FlashInterface>(
    flash: &mut F,
    region: Region,
) -> Result<(), StorageError> {
    flash
        .erase(region.base, region.size)
        .map_err(|e| device_error(region.base, e))
}
