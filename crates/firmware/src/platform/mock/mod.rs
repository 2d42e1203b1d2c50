//! Mock platform implementation for testing
//!
//! This module provides mock implementations of platform traits that can be used
//! for unit testing without requiring actual hardware.
//!
//! # Feature Gate
//!
//! This module is available in two contexts:
//! - During test builds (`#[cfg(test)]`)
//! - When the `mock` feature is enabled
//!
//! # Example
//!
//! ```
//! use delta_control_firmware::platform::mock::MockFlash;
//! use delta_control_firmware::platform::traits::FlashInterface;
//!
//! let mut flash = MockFlash::with_geometry(256, 64);
//! flash.program_word(0, 0xDEADBEEF).unwrap();
//! assert_eq!(flash.read_word(0).unwrap(), 0xDEADBEEF);
//! ```

mod flash;

pub use flash::MockFlash;
