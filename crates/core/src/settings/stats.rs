//! Settings store statistics for wear monitoring

use super::layout::RegionId;

/// Counters describing write and erase activity of the store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Entries appended by `upsert`
    pub appends: u32,
    /// `upsert` calls skipped because the stored value was identical
    pub deduplicated: u32,
    /// Completed region migrations (compactions)
    pub migrations: u32,
    /// Full formats of both regions
    pub formats: u32,
    /// Boot-time repairs of torn writes
    pub repairs: u32,
    /// Region currently receiving appends
    pub active_region: Option<RegionId>,
    /// Erase count per region (indexed by `RegionId::index`)
    pub erase_counts: [u32; 2],
}
