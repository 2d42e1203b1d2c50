//! Region lifecycle
//!
//! Tracks which of the two regions is active and moves the store between
//! the states `Unformatted -> Active(A) <-> Active(B)`.
//!
//! # Migration Order
//!
//! 1. Erase the spare region
//! 2. Copy the latest entry of every key (successor left erased)
//! 3. Program the spare's marker
//! 4. Erase the old active region
//!
//! A power loss before step 3 leaves the old region authoritative. A power
//! loss between steps 3 and 4 leaves both regions marked; `boot` keeps the
//! compacted one.

use super::scanner::{EntryRef, RegionScanner};
use super::{erase_region, program_word, read_word};
use crate::platform::FlashInterface;
use crate::{log_debug, log_error, log_info, log_warn};
use delta_control_core::settings::record::{self, EntryHeader, HEADER_SIZE};
use delta_control_core::settings::{
    Region, RegionId, RegionLayout, RegionRole, StorageError, REGION_MARKER, WORD_SIZE,
};

/// Store-wide region state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreState {
    /// No region carries a marker (or boot has not run)
    Unformatted,
    /// The given region is active
    Active(RegionId),
}

/// What `boot` found and did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootOutcome {
    /// Region active after boot
    pub active: RegionId,
    /// Append cursor in the active region
    pub cursor: u32,
    /// Blank media was formatted
    pub formatted: bool,
    /// Torn-write residue was compacted away
    pub repaired: bool,
}

/// Active-region state machine
#[derive(Debug, Clone)]
pub struct RegionLifecycle {
    layout: RegionLayout,
    state: StoreState,
    erase_counts: [u32; 2],
    migrations: u32,
    formats: u32,
    repairs: u32,
}

impl RegionLifecycle {
    /// Create an unformatted lifecycle for `layout`
    pub fn new(layout: RegionLayout) -> Self {
        Self {
            layout,
            state: StoreState::Unformatted,
            erase_counts: [0; 2],
            migrations: 0,
            formats: 0,
            repairs: 0,
        }
    }

    /// Region layout this lifecycle manages
    pub fn layout(&self) -> &RegionLayout {
        &self.layout
    }

    /// Current store-wide state
    pub fn state(&self) -> StoreState {
        self.state
    }

    /// Currently active region, if any
    pub fn active(&self) -> Option<RegionId> {
        match self.state {
            StoreState::Active(id) => Some(id),
            StoreState::Unformatted => None,
        }
    }

    /// Descriptor of the active region
    ///
    /// # Errors
    ///
    /// Returns `NotInitialized` while no region is active.
    pub fn active_region(&self) -> Result<Region, StorageError> {
        self.active()
            .map(|id| self.layout.region(id))
            .ok_or(StorageError::NotInitialized)
    }

    /// Role `id` currently plays
    pub fn role(&self, id: RegionId) -> RegionRole {
        match self.state {
            StoreState::Unformatted => RegionRole::Unformatted,
            StoreState::Active(active) if active == id => RegionRole::Active,
            StoreState::Active(_) => RegionRole::Spare,
        }
    }

    /// Erase operations issued per region since creation
    pub fn erase_counts(&self) -> [u32; 2] {
        self.erase_counts
    }

    /// Completed migrations, boot repairs included
    pub fn migrations(&self) -> u32 {
        self.migrations
    }

    /// Completed formats
    pub fn formats(&self) -> u32 {
        self.formats
    }

    /// Boots that had to compact torn-write residue
    pub fn repairs(&self) -> u32 {
        self.repairs
    }

    fn erase<F: FlashInterface>(&mut self, flash: &mut F, id: RegionId) -> Result<(), StorageError> {
        log_debug!("Erasing settings region {}", id.name());
        erase_region(flash, self.layout.region(id))?;
        self.erase_counts[id.index()] += 1;
        Ok(())
    }

    /// Probe the markers, select the active region and repair torn writes
    ///
    /// Blank media is formatted. Returns the resulting state and cursor.
    pub fn boot<F: FlashInterface>(&mut self, flash: &mut F) -> Result<BootOutcome, StorageError> {
        self.state = StoreState::Unformatted;

        let marked_a = RegionScanner::new(flash, self.layout.region(RegionId::A)).is_marked()?;
        let marked_b = RegionScanner::new(flash, self.layout.region(RegionId::B)).is_marked()?;

        let active = match (marked_a, marked_b) {
            (false, false) => {
                log_warn!("No settings region marked, formatting");
                let cursor = self.format(flash)?;
                return Ok(BootOutcome {
                    active: RegionId::A,
                    cursor,
                    formatted: true,
                    repaired: false,
                });
            }
            (true, false) => RegionId::A,
            (false, true) => RegionId::B,
            (true, true) => {
                let keep = self.resolve_double_marker(flash)?;
                log_warn!(
                    "Both settings regions marked, keeping {} and erasing {}",
                    keep.name(),
                    keep.other().name()
                );
                self.erase(flash, keep.other())?;
                keep
            }
        };

        self.state = StoreState::Active(active);
        let region = self.layout.region(active);
        let audit = RegionScanner::new(flash, region).audit()?;

        if audit.needs_repair() {
            log_warn!(
                "Torn write in settings region {} (dangling links: {}, dirty tail: {}), compacting",
                active.name(),
                audit.dangling_links,
                !audit.clean_tail
            );
            let cursor = self.migrate(flash, 0)?;
            self.repairs += 1;
            return Ok(BootOutcome {
                active: active.other(),
                cursor,
                formatted: false,
                repaired: true,
            });
        }

        log_info!(
            "Settings region {} active, {} entries, cursor {:#x}",
            active.name(),
            audit.entries,
            audit.end
        );

        Ok(BootOutcome {
            active,
            cursor: audit.end,
            formatted: false,
            repaired: false,
        })
    }

    /// Pick the authoritative region when both carry a marker
    ///
    /// Both hold the same live data; the compacted copy has the smaller end
    /// cursor. A region that fails to scan loses.
    fn resolve_double_marker<F: FlashInterface>(&self, flash: &mut F) -> Result<RegionId, StorageError> {
        let end_a = RegionScanner::new(flash, self.layout.region(RegionId::A)).find_end();
        let end_b = RegionScanner::new(flash, self.layout.region(RegionId::B)).find_end();

        let used = |id: RegionId, end: u32| end - self.layout.region(id).first_entry();

        match (end_a, end_b) {
            (Ok(a), Ok(b)) if used(RegionId::B, b) < used(RegionId::A, a) => Ok(RegionId::B),
            (Ok(_), _) => Ok(RegionId::A),
            (Err(_), Ok(_)) => Ok(RegionId::B),
            (Err(e), Err(_)) => {
                log_error!("Neither marked settings region scans cleanly");
                Err(e)
            }
        }
    }

    /// Erase both regions and activate region A
    ///
    /// Returns the append cursor of the fresh region.
    pub fn format<F: FlashInterface>(&mut self, flash: &mut F) -> Result<u32, StorageError> {
        log_info!("Formatting settings storage");
        self.state = StoreState::Unformatted;

        for id in RegionId::ALL {
            self.erase(flash, id)?;
        }

        let region = self.layout.region(RegionId::A);
        program_word(flash, region.base, REGION_MARKER)?;

        self.state = StoreState::Active(RegionId::A);
        self.formats += 1;
        Ok(region.first_entry())
    }

    /// Compact the latest version of every key into the spare region and activate it
    ///
    /// `reserve` bytes must remain free after the copy (room for a pending
    /// entry). Returns the append cursor of the new active region.
    ///
    /// # Errors
    ///
    /// - `NotInitialized` if no region is active
    /// - `CapacityExhausted` if the live set plus `reserve` does not fit;
    ///   nothing has been erased at that point
    pub fn migrate<F: FlashInterface>(&mut self, flash: &mut F, reserve: u32) -> Result<u32, StorageError> {
        let from_id = self.active().ok_or(StorageError::NotInitialized)?;
        let to_id = from_id.other();
        let from = self.layout.region(from_id);
        let to = self.layout.region(to_id);

        let (keys, live_bytes) = RegionScanner::new(flash, from).live_footprint()?;

        let required = live_bytes.saturating_add(reserve);
        if required > to.capacity() {
            log_error!(
                "Live settings need {} bytes, region {} holds {}",
                required,
                to_id.name(),
                to.capacity()
            );
            return Err(StorageError::CapacityExhausted {
                required,
                available: to.capacity(),
            });
        }

        log_info!(
            "Migrating {} settings from region {} to {}",
            keys,
            from_id.name(),
            to_id.name()
        );

        self.erase(flash, to_id)?;

        // Second pass over the old region, copying in scan order
        let mut address = from.first_entry();
        let mut cursor = to.first_entry();
        loop {
            let next = RegionScanner::new(flash, from).next_latest(address)?;
            let Some(entry) = next else {
                break;
            };
            cursor = copy_entry(flash, &entry, cursor)?;
            address = entry.next_address();
        }

        program_word(flash, to.base, REGION_MARKER)?;
        self.state = StoreState::Active(to_id);

        self.erase(flash, from_id)?;
        self.migrations += 1;

        Ok(cursor)
    }
}

/// Copy `entry` to `dest` as a fresh, unlinked entry
///
/// Padding bytes are masked to zero. The info word is programmed last.
/// Returns the address after the copy.
fn copy_entry<F: FlashInterface>(flash: &mut F, entry: &EntryRef, dest: u32) -> Result<u32, StorageError> {
    let header = EntryHeader::new(entry.header.key, entry.header.length);
    let mut remaining = usize::from(header.length);

    for i in 0..record::payload_words(header.length) {
        let offset = i * WORD_SIZE;
        let word = read_word(flash, entry.payload_address() + offset)?;
        let valid = remaining.min(WORD_SIZE as usize);
        program_word(flash, dest + HEADER_SIZE + offset, record::mask_padding(word, valid))?;
        remaining -= valid;
    }

    program_word(flash, dest, header.info_word())?;
    Ok(dest + header.size())
}
