#![cfg_attr(not(any(test, feature = "mock")), no_std)]

//! delta_control_firmware - settings storage for the delta robot controller
//!
//! This crate provides the Flash-backed settings store and the platform
//! layer it runs on.
//!
//! # Design Principles
//!
//! - **Platform isolation**: all hardware access goes through `FlashInterface`
//! - **Power-loss tolerance**: every write is ordered so a torn write is
//!   detected and compacted away on the next boot
//! - **Host testability**: `MockFlash` (feature `mock`) stands in for the
//!   RP2350 Flash in unit, integration and property tests

// Platform abstraction layer
pub mod platform;

// Settings store and logging
pub mod core;

// Note: Logging macros (log_info!, log_warn!, log_error!, log_debug!)
// are exported at crate root via #[macro_export] in core::logging
