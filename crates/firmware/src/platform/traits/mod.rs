//! Platform trait definitions
//!
//! Hardware-facing interfaces implemented once per platform.

pub mod flash;

pub use flash::FlashInterface;
