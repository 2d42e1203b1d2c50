//! Region scanning
//!
//! Walks the entries of one region in write order. Every address the scanner
//! touches is validated against the region bounds first, so a corrupted
//! length or successor field surfaces as a `StorageError` instead of a read
//! outside the region.

use super::read_word;
use crate::platform::FlashInterface;
use delta_control_core::settings::record::{self, EntryHeader, HEADER_SIZE};
use delta_control_core::settings::{Region, StorageError, ERASED_WORD, REGION_MARKER, WORD_SIZE};

/// A decoded entry and its location
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryRef {
    /// Address of the info word
    pub address: u32,
    /// Decoded header
    pub header: EntryHeader,
}

impl EntryRef {
    /// Address of the successor word
    pub fn successor_address(&self) -> u32 {
        self.address + WORD_SIZE
    }

    /// Address of the first payload word
    pub fn payload_address(&self) -> u32 {
        self.address + HEADER_SIZE
    }

    /// Address immediately after this entry
    pub fn next_address(&self) -> u32 {
        self.address + self.header.size()
    }
}

/// Result of a full consistency pass over a region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionAudit {
    /// First blank header (the append cursor)
    pub end: u32,
    /// Number of entries in the region
    pub entries: u32,
    /// Successor links pointing at blank flash or a foreign key
    pub dangling_links: u32,
    /// Whether every word from `end` to the region end is erased
    pub clean_tail: bool,
}

impl RegionAudit {
    /// Whether a torn write left traces that must be compacted away
    pub fn needs_repair(&self) -> bool {
        !self.clean_tail || self.dangling_links > 0
    }
}

/// Read-only walker over one region
pub struct RegionScanner<'a, F: FlashInterface> {
    flash: &'a mut F,
    region: Region,
}

impl<'a, F: FlashInterface> RegionScanner<'a, F> {
    /// Create a scanner for `region`
    pub fn new(flash: &'a mut F, region: Region) -> Self {
        Self { flash, region }
    }

    /// Whether the region carries the active marker
    pub fn is_marked(&mut self) -> Result<bool, StorageError> {
        Ok(read_word(self.flash, self.region.base)? == REGION_MARKER)
    }

    /// Decode the entry at `address`
    ///
    /// Returns `None` for a blank header (end of written data).
    ///
    /// # Errors
    ///
    /// - `OutOfBounds` if `address` is not a valid entry slot
    /// - `RegionOverrun` if the entry would cover the terminator word
    pub fn entry_at(&mut self, address: u32) -> Result<Option<EntryRef>, StorageError> {
        let address = self.region.check(address)?;
        let info = read_word(self.flash, address)?;

        let Some(mut header) = EntryHeader::decode(info, record::NO_SUCCESSOR) else {
            return Ok(None);
        };

        if address
            .checked_add(header.size())
            .is_none_or(|end| end > self.region.last_word())
        {
            return Err(StorageError::RegionOverrun {
                base: self.region.base,
            });
        }

        header.successor = read_word(self.flash, address + WORD_SIZE)?;

        Ok(Some(EntryRef { address, header }))
    }

    /// Find the first free word after the written entries
    ///
    /// # Errors
    ///
    /// Returns `RegionOverrun` if the scan runs into the region's last word
    /// without meeting a blank header.
    pub fn find_end(&mut self) -> Result<u32, StorageError> {
        let mut address = self.region.first_entry();
        while let Some(entry) = self.entry_at(address)? {
            address = entry.next_address();
        }
        Ok(address)
    }

    /// Find the latest version of `key`
    ///
    /// Scans linearly for the first entry with `key`, then follows successor
    /// links directly to the newest version.
    pub fn find_latest(&mut self, key: u16) -> Result<Option<EntryRef>, StorageError> {
        let mut address = self.region.first_entry();
        while let Some(entry) = self.entry_at(address)? {
            if entry.header.key == key {
                return self.follow_chain(entry).map(Some);
            }
            address = entry.next_address();
        }
        Ok(None)
    }

    /// Follow successor links from `entry` to the chain tail
    fn follow_chain(&mut self, mut entry: EntryRef) -> Result<EntryRef, StorageError> {
        while entry.header.has_successor() {
            match self.link_target(&entry)? {
                Some(next) => entry = next,
                None => break,
            }
        }
        Ok(entry)
    }

    /// Resolve the successor link of `entry`
    ///
    /// Returns `None` when the link dangles: it points at blank flash or at an
    /// entry for another key, left behind when power failed between linking
    /// and committing the new entry. The linking entry is then the last
    /// fully-written version.
    ///
    /// # Errors
    ///
    /// - `OutOfBounds` if the link leaves the region
    /// - `Corrupted` if the link points backwards (links only ever point forward)
    pub fn link_target(&mut self, entry: &EntryRef) -> Result<Option<EntryRef>, StorageError> {
        let target = self.region.check(entry.header.successor)?;

        if target < entry.next_address() {
            return Err(StorageError::Corrupted {
                address: entry.successor_address(),
            });
        }

        match self.entry_at(target)? {
            Some(next) if next.header.key == entry.header.key => Ok(Some(next)),
            _ => Ok(None),
        }
    }

    /// Check the region for traces of an interrupted write
    pub fn audit(&mut self) -> Result<RegionAudit, StorageError> {
        let mut address = self.region.first_entry();
        let mut entries = 0;
        let mut dangling_links = 0;

        while let Some(entry) = self.entry_at(address)? {
            entries += 1;
            if entry.header.has_successor() && self.link_target(&entry)?.is_none() {
                dangling_links += 1;
            }
            address = entry.next_address();
        }

        let end = address;
        let mut clean_tail = true;
        while address < self.region.end() {
            if read_word(self.flash, address)? != ERASED_WORD {
                clean_tail = false;
                break;
            }
            address += WORD_SIZE;
        }

        Ok(RegionAudit {
            end,
            entries,
            dangling_links,
            clean_tail,
        })
    }

    /// Next entry at or after `address` that is the latest version of its key
    ///
    /// An entry is latest when its successor word is erased or its link
    /// dangles. Walking forward from `first_entry` with this visits every
    /// live key exactly once, in write order, without tracking the key set.
    pub fn next_latest(&mut self, mut address: u32) -> Result<Option<EntryRef>, StorageError> {
        while let Some(entry) = self.entry_at(address)? {
            if !entry.header.has_successor() || self.link_target(&entry)?.is_none() {
                return Ok(Some(entry));
            }
            address = entry.next_address();
        }
        Ok(None)
    }

    /// Number of live keys and the bytes their latest versions occupy
    pub fn live_footprint(&mut self) -> Result<(u32, u32), StorageError> {
        let mut keys = 0u32;
        let mut bytes = 0u32;
        let mut address = self.region.first_entry();

        while let Some(entry) = self.next_latest(address)? {
            keys += 1;
            bytes = bytes.saturating_add(entry.header.size());
            address = entry.next_address();
        }

        Ok((keys, bytes))
    }

    /// Compare the stored payload of `entry` with `payload`
    ///
    /// Padding bytes of the final word are ignored.
    pub fn payload_matches(&mut self, entry: &EntryRef, payload: &[u8]) -> Result<bool, StorageError> {
        if usize::from(entry.header.length) != payload.len() {
            return Ok(false);
        }

        let mut address = entry.payload_address();
        for chunk in payload.chunks(WORD_SIZE as usize) {
            let stored = record::mask_padding(read_word(self.flash, address)?, chunk.len());
            if stored != record::encode_chunk(chunk) {
                return Ok(false);
            }
            address += WORD_SIZE;
        }

        Ok(true)
    }

    /// Copy up to `buf.len()` payload bytes of `entry` into `buf`
    ///
    /// Returns the number of bytes copied.
    pub fn read_payload(&mut self, entry: &EntryRef, buf: &mut [u8]) -> Result<usize, StorageError> {
        let len = usize::from(entry.header.length).min(buf.len());

        let mut address = entry.payload_address();
        for chunk in buf[..len].chunks_mut(WORD_SIZE as usize) {
            record::decode_chunk(read_word(self.flash, address)?, chunk);
            address += WORD_SIZE;
        }

        Ok(len)
    }
}
