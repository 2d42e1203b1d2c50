//! Platform error types
//!
//! Errors reported by the Flash drivers. The settings engine maps them into
//! `StorageError` together with the failing address.

use core::fmt;

/// Result type for platform operations
pub type Result<T> = core::result::Result<T, PlatformError>;

/// Platform-level errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PlatformError {
    /// Flash operation failed
    Flash(FlashError),
}

/// Flash-specific errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlashError {
    /// Erased range did not read back as 0xFFFFFFFF
    EraseFailed,
    /// Programmed word did not read back as written
    WriteFailed,
    /// Address out of bounds or inside the protected firmware image
    InvalidAddress,
    /// Address not aligned to a word or block boundary
    Misaligned,
    /// Target word is not in the erased state
    NotErased,
    /// Supply dropped before the operation completed
    PowerLoss,
}

impl fmt::Display for FlashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            FlashError::EraseFailed => "erase verify failed",
            FlashError::WriteFailed => "program verify failed",
            FlashError::InvalidAddress => "invalid or protected address",
            FlashError::Misaligned => "misaligned address",
            FlashError::NotErased => "word not erased",
            FlashError::PowerLoss => "power lost",
        };
        f.write_str(text)
    }
}

impl fmt::Display for PlatformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlatformError::Flash(e) => write!(f, "flash: {}", e),
        }
    }
}

impl From<FlashError> for PlatformError {
    fn from(error: FlashError) -> Self {
        PlatformError::Flash(error)
    }
}
