//! Hivemon firmware library.
//!
//! Exposes the power-cycle core, its ports and every adapter for
//! integration testing. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod error;
pub mod events;
pub mod pins;
pub mod power;
pub mod scheduler;

pub mod adapters;
pub mod drivers;
pub mod sensors;
