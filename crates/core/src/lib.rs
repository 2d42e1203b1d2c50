//! delta_control_core - Pure no_std types for the delta controller
//!
//! This crate contains the platform-agnostic part of the non-volatile
//! settings store and can be tested on host without any feature flags.
//!
//! # Design Principles
//!
//! - **Zero cfg**: No `#[cfg(feature = ...)]` directives allowed
//! - **Pure no_std**: No std library dependencies
//! - **Bit-exact layout**: Everything that defines what lands on flash lives here
//!
//! # Modules
//!
//! - [`settings`]: Region geometry, entry codec, errors and statistics

#![no_std]

pub mod settings;
