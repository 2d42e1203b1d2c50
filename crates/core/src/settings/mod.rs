//! Settings store types
//!
//! Persisted layout, record codec and error taxonomy of the log-structured
//! key/value store. The flash-driving engine lives in the firmware crate.

pub mod error;
pub mod layout;
pub mod record;
pub mod stats;

pub use error::StorageError;
pub use layout::{
    Region, RegionId, RegionLayout, RegionRole, DEFAULT_LAYOUT, ERASED_WORD, MARKER_SIZE,
    MIN_REGION_SIZE, REGION_MARKER, WORD_SIZE,
};
pub use record::{
    entry_size, entry_words, EntryHeader, PayloadWords, HEADER_SIZE, MAX_PAYLOAD_LEN,
    NO_SUCCESSOR,
};
pub use stats::StoreStats;
