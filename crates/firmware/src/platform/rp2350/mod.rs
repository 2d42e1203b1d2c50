//! RP2350 platform implementation
//!
//! Hardware bindings for the Raspberry Pi Pico 2 W.

pub mod flash;

pub use flash::Rp2350Flash;
