//! Flash region geometry for the settings log
//!
//! The settings log lives in exactly two independently erasable regions.
//! One of them is active at any time; the other is kept erased as the
//! migration target.
//!
//! # Flash Layout (default)
//!
//! ```text
//! [Firmware]           0x000000 - 0x040000 (256 KB) - DO NOT WRITE
//! [Settings Region A]  0x040000 - 0x042000 (8 KB)
//! [Settings Region B]  0x042000 - 0x044000 (8 KB)
//! ```
//!
//! # Region Format
//!
//! ```text
//! ┌──────────────────────────────┐
//! │ Marker: u32 = 0xDEADBEEF     │  Offset: 0 (erased when not active)
//! ├──────────────────────────────┤
//! │ Entry 0                      │  Offset: 4
//! │ Entry 1                      │
//! │ ...                          │
//! ├──────────────────────────────┤
//! │ Erased (0xFFFFFFFF)          │  Append cursor onwards
//! └──────────────────────────────┘
//! ```

use super::error::StorageError;

/// Program granularity of the underlying flash (bytes)
pub const WORD_SIZE: u32 = 4;

/// Value of a word after erase and before any program operation
pub const ERASED_WORD: u32 = 0xFFFF_FFFF;

/// Marker written at the base of the active region
pub const REGION_MARKER: u32 = 0xDEAD_BEEF;

/// Size of the marker field
pub const MARKER_SIZE: u32 = WORD_SIZE;

/// Smallest usable region: marker, one entry header and the blank terminator
pub const MIN_REGION_SIZE: u32 = MARKER_SIZE + 3 * WORD_SIZE;

/// Identifier of one of the two settings regions
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RegionId {
    /// First region (active after a format)
    A,
    /// Second region
    B,
}

impl RegionId {
    /// Both regions, in probe order
    pub const ALL: [RegionId; 2] = [RegionId::A, RegionId::B];

    /// The region that is not `self`
    pub fn other(self) -> Self {
        match self {
            RegionId::A => RegionId::B,
            RegionId::B => RegionId::A,
        }
    }

    /// Array index of this region (0 or 1)
    pub fn index(self) -> usize {
        match self {
            RegionId::A => 0,
            RegionId::B => 1,
        }
    }

    /// Short name for log output
    pub fn name(self) -> &'static str {
        match self {
            RegionId::A => "A",
            RegionId::B => "B",
        }
    }
}

impl core::fmt::Display for RegionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// Role a region currently plays in the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionRole {
    /// Holds the marker and receives appends
    Active,
    /// Erased (or mid-migration) target for the next compaction
    Spare,
    /// Neither region carries a marker yet
    Unformatted,
}

/// A fixed, independently erasable address range
///
/// All addresses are absolute flash offsets in bytes and always word aligned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    /// First byte of the region (the marker word)
    pub base: u32,
    /// Region size in bytes
    pub size: u32,
}

impl Region {
    /// Create a region descriptor
    pub const fn new(base: u32, size: u32) -> Self {
        Self { base, size }
    }

    /// One past the last byte of the region
    pub const fn end(&self) -> u32 {
        self.base + self.size
    }

    /// Address of the first entry (immediately after the marker)
    pub const fn first_entry(&self) -> u32 {
        self.base + MARKER_SIZE
    }

    /// Address of the final word, which always stays blank as the scan terminator
    pub const fn last_word(&self) -> u32 {
        self.end() - WORD_SIZE
    }

    /// Bytes available for entries
    pub const fn capacity(&self) -> u32 {
        self.last_word() - self.first_entry()
    }

    /// Whether `address` lies anywhere inside the region
    pub fn contains(&self, address: u32) -> bool {
        (self.base..self.end()).contains(&address)
    }

    /// Whether an entry of `bytes` starting at `address` leaves the terminator word blank
    pub fn fits(&self, address: u32, bytes: u32) -> bool {
        address >= self.first_entry()
            && address
                .checked_add(bytes)
                .is_some_and(|entry_end| entry_end <= self.last_word())
    }

    /// Validate an entry address against the region bounds
    ///
    /// Entry addresses must be word aligned and lie between the first entry
    /// slot and the terminator word (inclusive).
    pub fn check(&self, address: u32) -> Result<u32, StorageError> {
        if !address.is_multiple_of(WORD_SIZE)
            || address < self.first_entry()
            || address > self.last_word()
        {
            return Err(StorageError::OutOfBounds { address });
        }
        Ok(address)
    }

    fn overlaps(&self, other: &Region) -> bool {
        self.base < other.end() && other.base < self.end()
    }
}

/// Placement of the two settings regions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionLayout {
    regions: [Region; 2],
}

/// Default placement right after the protected firmware image
pub const DEFAULT_LAYOUT: RegionLayout = RegionLayout::new(
    Region::new(0x040000, 0x2000),
    Region::new(0x042000, 0x2000),
);

impl RegionLayout {
    /// Create a layout from the two regions
    pub const fn new(a: Region, b: Region) -> Self {
        Self { regions: [a, b] }
    }

    /// Region descriptor for `id`
    pub fn region(&self, id: RegionId) -> Region {
        self.regions[id.index()]
    }

    /// Check the layout against the erase granularity of the device
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InvalidLayout` if a region is not block aligned,
    /// is smaller than `MIN_REGION_SIZE`, overflows the address space, or
    /// the two regions overlap.
    pub fn validate(&self, block_size: u32) -> Result<(), StorageError> {
        if block_size == 0 || !block_size.is_multiple_of(WORD_SIZE) {
            return Err(StorageError::InvalidLayout);
        }

        for region in &self.regions {
            if region.base.checked_add(region.size).is_none()
                || region.size < MIN_REGION_SIZE
                || !region.base.is_multiple_of(block_size)
                || !region.size.is_multiple_of(block_size)
            {
                return Err(StorageError::InvalidLayout);
            }
        }

        if self.regions[0].overlaps(&self.regions[1]) {
            return Err(StorageError::InvalidLayout);
        }

        Ok(())
    }
}

impl Default for RegionLayout {
    fn default() -> Self {
        DEFAULT_LAYOUT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_bounds() {
        let region = Region::new(0x1000, 64);

        assert_eq!(region.end(), 0x1040);
        assert_eq!(region.first_entry(), 0x1004);
        assert_eq!(region.last_word(), 0x103C);
        assert_eq!(region.capacity(), 56);
        assert!(region.contains(0x1000));
        assert!(region.contains(0x103F));
        assert!(!region.contains(0x1040));
    }

    #[test]
    fn test_region_fits_keeps_terminator_blank() {
        let region = Region::new(0x1000, 64);

        // Entry ending exactly at the terminator word
        assert!(region.fits(0x1004, 56));
        // One word more would overwrite the terminator
        assert!(!region.fits(0x1004, 60));
        assert!(!region.fits(0x1038, 8));
        // Marker word is never an entry slot
        assert!(!region.fits(0x1000, 8));
    }

    #[test]
    fn test_region_check() {
        let region = Region::new(0x1000, 64);

        assert_eq!(region.check(0x1004), Ok(0x1004));
        assert_eq!(region.check(0x103C), Ok(0x103C));
        assert_eq!(
            region.check(0x1000),
            Err(StorageError::OutOfBounds { address: 0x1000 })
        );
        assert_eq!(
            region.check(0x1006),
            Err(StorageError::OutOfBounds { address: 0x1006 })
        );
        assert_eq!(
            region.check(0x1040),
            Err(StorageError::OutOfBounds { address: 0x1040 })
        );
    }

    #[test]
    fn test_region_id_other() {
        assert_eq!(RegionId::A.other(), RegionId::B);
        assert_eq!(RegionId::B.other(), RegionId::A);
        assert_eq!(RegionId::A.index(), 0);
        assert_eq!(RegionId::B.index(), 1);
    }

    #[test]
    fn test_default_layout_is_valid() {
        assert_eq!(DEFAULT_LAYOUT.validate(4096), Ok(()));
        assert_eq!(RegionLayout::default(), DEFAULT_LAYOUT);
        assert_eq!(DEFAULT_LAYOUT.region(RegionId::B).base, 0x042000);
    }

    #[test]
    fn test_layout_validation() {
        // Overlapping regions
        let layout = RegionLayout::new(Region::new(0x1000, 0x100), Region::new(0x1080, 0x100));
        assert_eq!(layout.validate(16), Err(StorageError::InvalidLayout));

        // Not block aligned
        let layout = RegionLayout::new(Region::new(0x1008, 0x100), Region::new(0x2000, 0x100));
        assert_eq!(layout.validate(16), Err(StorageError::InvalidLayout));

        // Too small
        let layout = RegionLayout::new(Region::new(0x1000, 8), Region::new(0x2000, 8));
        assert_eq!(layout.validate(8), Err(StorageError::InvalidLayout));

        // Adjacent is fine
        let layout = RegionLayout::new(Region::new(0x1000, 0x100), Region::new(0x1100, 0x100));
        assert_eq!(layout.validate(16), Ok(()));
    }
}
