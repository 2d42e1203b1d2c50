//! Settings store error types
//!
//! Errors fall into three groups:
//! - Caller input (`ReservedKey`, `PayloadTooLarge`): rejected before any flash access
//! - Lifecycle (`NotInitialized`, `Faulted`, `InvalidLayout`): the store is not usable yet
//! - Fatal (everything else): media is corrupt or the device failed; the store must be
//!   reset and booted again

/// Errors from settings store operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Store has not been booted or formatted
    NotInitialized,
    /// An earlier fatal error stopped the store; reset required
    Faulted,
    /// Key 0xFFFF is reserved for blank flash
    ReservedKey,
    /// Payload can never fit into an entry or a region
    PayloadTooLarge {
        /// Requested payload length in bytes
        len: usize,
    },
    /// Region layout does not match the device geometry
    InvalidLayout,
    /// Scan reached the end of a region without a blank terminator
    RegionOverrun {
        /// Base address of the region
        base: u32,
    },
    /// Marker present but the region contents are unreadable
    Corrupted {
        /// Address of the offending word
        address: u32,
    },
    /// Entry or successor address outside the region bounds
    OutOfBounds {
        /// The rejected address
        address: u32,
    },
    /// Live key set does not fit into the spare region after compaction
    CapacityExhausted {
        /// Bytes needed by the live set plus the pending entry
        required: u32,
        /// Bytes available in the spare region
        available: u32,
    },
    /// Attempt to program a word that was not erased
    ProgramViolation {
        /// Address of the word
        address: u32,
    },
    /// Device reported a read, program or erase failure
    Device {
        /// Address of the failed operation
        address: u32,
    },
}

impl StorageError {
    /// Whether this error requires a reset before the store can be used again
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            StorageError::RegionOverrun { .. }
                | StorageError::Corrupted { .. }
                | StorageError::OutOfBounds { .. }
                | StorageError::CapacityExhausted { .. }
                | StorageError::ProgramViolation { .. }
                | StorageError::Device { .. }
        )
    }

    /// Return variant name as a static string (usable with defmt on embedded)
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageError::NotInitialized => "NotInitialized",
            StorageError::Faulted => "Faulted",
            StorageError::ReservedKey => "ReservedKey",
            StorageError::PayloadTooLarge { .. } => "PayloadTooLarge",
            StorageError::InvalidLayout => "InvalidLayout",
            StorageError::RegionOverrun { .. } => "RegionOverrun",
            StorageError::Corrupted { .. } => "Corrupted",
            StorageError::OutOfBounds { .. } => "OutOfBounds",
            StorageError::CapacityExhausted { .. } => "CapacityExhausted",
            StorageError::ProgramViolation { .. } => "ProgramViolation",
            StorageError::Device { .. } => "Device",
        }
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            StorageError::NotInitialized => write!(f, "settings store not initialized"),
            StorageError::Faulted => write!(f, "settings store faulted, reset required"),
            StorageError::ReservedKey => write!(f, "key 0xFFFF is reserved"),
            StorageError::PayloadTooLarge { len } => {
                write!(f, "payload of {} bytes does not fit", len)
            }
            StorageError::InvalidLayout => write!(f, "invalid settings region layout"),
            StorageError::RegionOverrun { base } => {
                write!(f, "region {:#x} has no blank terminator", base)
            }
            StorageError::Corrupted { address } => {
                write!(f, "corrupted settings data at {:#x}", address)
            }
            StorageError::OutOfBounds { address } => {
                write!(f, "address {:#x} outside settings region", address)
            }
            StorageError::CapacityExhausted {
                required,
                available,
            } => write!(
                f,
                "live settings need {} bytes, region holds {}",
                required, available
            ),
            StorageError::ProgramViolation { address } => {
                write!(f, "program of non-erased word at {:#x}", address)
            }
            StorageError::Device { address } => {
                write!(f, "flash device failure at {:#x}", address)
            }
        }
    }
}
