//! Settings store engine
//!
//! The only entry point application code uses. Owns the flash device, the
//! region lifecycle and the append cursor.
//!
//! # Usage
//!
//! ```
//! use delta_control_firmware::core::settings::{SettingsStore, DEFAULT_LAYOUT};
//! use delta_control_firmware::platform::mock::MockFlash;
//!
//! let mut store = SettingsStore::new(MockFlash::new(), DEFAULT_LAYOUT);
//! store.init().unwrap();
//!
//! store.upsert(0x0101, &1500u16.to_le_bytes()).unwrap();
//!
//! let mut buf = [0u8; 2];
//! assert_eq!(store.fetch(0x0101, &mut buf), 2);
//! assert_eq!(u16::from_le_bytes(buf), 1500);
//! ```
//!
//! # Faults
//!
//! A fatal error (corrupt media, device failure, exhausted capacity) poisons
//! the store: `upsert`, `format` and `migrate` return `Faulted` and `fetch`
//! returns 0 until `init()` runs again after a reset.

use super::lifecycle::{BootOutcome, RegionLifecycle};
use super::program_word;
use super::scanner::RegionScanner;
use crate::platform::{FlashGuard, FlashInterface};
use crate::{log_debug, log_error, log_info};
use delta_control_core::settings::record::{
    self, EntryHeader, PayloadWords, BLANK_KEY, HEADER_SIZE, MAX_PAYLOAD_LEN,
};
use delta_control_core::settings::{
    Region, RegionId, RegionLayout, RegionRole, StorageError, StoreStats, WORD_SIZE,
};

/// Log-structured key/value store over two flash regions
pub struct SettingsStore<F: FlashInterface> {
    flash: F,
    lifecycle: RegionLifecycle,
    /// First free word in the active region
    cursor: u32,
    faulted: bool,
    appends: u32,
    deduplicated: u32,
}

impl<F: FlashInterface> SettingsStore<F> {
    /// Create a store over `flash`; call `init()` before use
    pub fn new(flash: F, layout: RegionLayout) -> Self {
        Self {
            flash,
            lifecycle: RegionLifecycle::new(layout),
            cursor: 0,
            faulted: false,
            appends: 0,
            deduplicated: 0,
        }
    }

    /// Boot the store
    ///
    /// Validates the layout, probes both regions, formats blank media and
    /// compacts away any torn write left by a power loss. Clears an earlier
    /// fault.
    ///
    /// # Errors
    ///
    /// - `InvalidLayout` if the regions do not match the device geometry
    /// - Any fatal error from scanning, formatting or repair
    pub fn init(&mut self) -> Result<BootOutcome, StorageError> {
        let layout = *self.lifecycle.layout();
        layout.validate(self.flash.block_size())?;

        if RegionId::ALL
            .iter()
            .any(|id| layout.region(*id).end() > self.flash.capacity())
        {
            return Err(StorageError::InvalidLayout);
        }

        let _guard = FlashGuard::acquire();

        self.faulted = false;
        self.cursor = 0;

        match self.lifecycle.boot(&mut self.flash) {
            Ok(outcome) => {
                self.cursor = outcome.cursor;
                Ok(outcome)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Store `payload` as the new value of `key`
    ///
    /// Writing the value already stored is a no-op. Migrates to the spare
    /// region when the active one is full.
    ///
    /// # Errors
    ///
    /// - `ReservedKey` for key 0xFFFF
    /// - `PayloadTooLarge` if the entry can never fit into a region
    /// - `NotInitialized` / `Faulted` if the store is not usable
    /// - Any fatal error from the device or the media
    pub fn upsert(&mut self, key: u16, payload: &[u8]) -> Result<(), StorageError> {
        self.ready()?;

        if key == BLANK_KEY {
            return Err(StorageError::ReservedKey);
        }

        let too_large = StorageError::PayloadTooLarge { len: payload.len() };
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(too_large);
        }
        let length = payload.len() as u16;
        if record::entry_size(length) > self.smallest_capacity() {
            return Err(too_large);
        }

        let _guard = FlashGuard::acquire();

        self.append(key, payload, length).map_err(|e| self.fail(e))
    }

    fn append(&mut self, key: u16, payload: &[u8], length: u16) -> Result<(), StorageError> {
        let bytes = record::entry_size(length);
        let mut region = self.lifecycle.active_region()?;

        let mut scanner = RegionScanner::new(&mut self.flash, region);
        let mut previous = scanner.find_latest(key)?;

        if let Some(entry) = &previous {
            if scanner.payload_matches(entry, payload)? {
                log_debug!("Setting {:#x} unchanged, write skipped", key);
                self.deduplicated += 1;
                return Ok(());
            }
        }

        if !region.fits(self.cursor, bytes) {
            log_info!(
                "Settings region full at {:#x}, {} bytes pending",
                self.cursor,
                bytes
            );
            self.cursor = self.lifecycle.migrate(&mut self.flash, bytes)?;
            region = self.lifecycle.active_region()?;
            previous = RegionScanner::new(&mut self.flash, region).find_latest(key)?;
        }

        let address = self.cursor;

        // Link first: until the info word below is committed the link
        // dangles and readers keep resolving to `previous`
        if let Some(entry) = previous {
            program_word(&mut self.flash, entry.successor_address(), address)?;
        }

        let header = EntryHeader::new(key, length);
        let mut word_address = address + HEADER_SIZE;
        for word in PayloadWords::new(payload) {
            program_word(&mut self.flash, word_address, word)?;
            word_address += WORD_SIZE;
        }
        program_word(&mut self.flash, address, header.info_word())?;

        self.cursor = address + header.size();
        self.appends += 1;

        Ok(())
    }

    /// Copy the latest value of `key` into `buf`
    ///
    /// Returns the number of bytes copied: `min(stored length, buf.len())`,
    /// or 0 if the key is absent or the store is not usable. A short buffer
    /// silently truncates; use [`stored_len`](Self::stored_len) to size it.
    pub fn fetch(&mut self, key: u16, buf: &mut [u8]) -> usize {
        match self.read_latest(key, buf) {
            Ok(copied) => copied,
            Err(e) => {
                self.fail(e);
                0
            }
        }
    }

    fn read_latest(&mut self, key: u16, buf: &mut [u8]) -> Result<usize, StorageError> {
        let region = self.ready()?;
        let mut scanner = RegionScanner::new(&mut self.flash, region);

        match scanner.find_latest(key)? {
            Some(entry) => scanner.read_payload(&entry, buf),
            None => Ok(0),
        }
    }

    /// Length of the stored value of `key`, or `None` if absent
    pub fn stored_len(&mut self, key: u16) -> Result<Option<usize>, StorageError> {
        let region = self.ready()?;

        let latest = RegionScanner::new(&mut self.flash, region).find_latest(key);
        match latest {
            Ok(entry) => Ok(entry.map(|e| usize::from(e.header.length))),
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Erase all settings and restart in region A
    pub fn format(&mut self) -> Result<(), StorageError> {
        self.ready()?;
        let _guard = FlashGuard::acquire();

        match self.lifecycle.format(&mut self.flash) {
            Ok(cursor) => {
                self.cursor = cursor;
                Ok(())
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Compact the live settings into the spare region now
    ///
    /// Normally triggered by `upsert` when the active region is full.
    pub fn migrate(&mut self) -> Result<(), StorageError> {
        self.ready()?;
        let _guard = FlashGuard::acquire();

        match self.lifecycle.migrate(&mut self.flash, 0) {
            Ok(cursor) => {
                self.cursor = cursor;
                Ok(())
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Region currently receiving appends
    pub fn active_region(&self) -> Option<RegionId> {
        self.lifecycle.active()
    }

    /// Role `id` currently plays
    pub fn region_role(&self, id: RegionId) -> RegionRole {
        self.lifecycle.role(id)
    }

    /// Next write address, or `None` before `init()`
    pub fn append_cursor(&self) -> Option<u32> {
        self.lifecycle.active().map(|_| self.cursor)
    }

    /// Bytes left for entries before the next migration
    pub fn free_bytes(&self) -> u32 {
        match self.lifecycle.active_region() {
            Ok(region) => region.last_word().saturating_sub(self.cursor),
            Err(_) => 0,
        }
    }

    /// Whether a fatal error stopped the store
    pub fn is_faulted(&self) -> bool {
        self.faulted
    }

    /// Snapshot of the operation and wear counters
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            appends: self.appends,
            deduplicated: self.deduplicated,
            migrations: self.lifecycle.migrations(),
            formats: self.lifecycle.formats(),
            repairs: self.lifecycle.repairs(),
            active_region: self.lifecycle.active(),
            erase_counts: self.lifecycle.erase_counts(),
        }
    }

    /// Borrow the flash device
    pub fn flash(&self) -> &F {
        &self.flash
    }

    /// Mutably borrow the flash device (diagnostics only; bypasses the store)
    pub fn flash_mut(&mut self) -> &mut F {
        &mut self.flash
    }

    /// Release the flash device
    pub fn into_flash(self) -> F {
        self.flash
    }

    /// Active region, unless faulted or not booted
    fn ready(&self) -> Result<Region, StorageError> {
        if self.faulted {
            return Err(StorageError::Faulted);
        }
        self.lifecycle.active_region()
    }

    /// Entry space of the smaller region
    fn smallest_capacity(&self) -> u32 {
        let layout = self.lifecycle.layout();
        RegionId::ALL
            .iter()
            .map(|id| layout.region(*id).capacity())
            .min()
            .unwrap_or(0)
    }

    /// Poison the store on fatal errors; passes `error` through
    fn fail(&mut self, error: StorageError) -> StorageError {
        if error.is_fatal() && !self.faulted {
            log_error!("Settings store faulted: {}", error.as_str());
            self.faulted = true;
        }
        error
    }
}
