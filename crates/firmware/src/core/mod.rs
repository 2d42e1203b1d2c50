//! Core firmware functionality
//!
//! Firmware-side logic built on the platform layer. Pure types live in
//! `delta_control_core`.

pub mod logging;

// Flash-backed key/value settings log
pub mod settings;
