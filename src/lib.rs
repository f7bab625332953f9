//! ButtonHub firmware library.
//!
//! Exposes the pure-logic modules for integration testing and external
//! inspection. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod config;
pub mod dispatch;
pub mod events;
pub mod model;
pub mod robot_info;
pub mod rpc;
pub mod table;
pub mod version;

pub mod error;

// ESP-IDF-backed modules; host backends live behind cfg inside.
pub mod adapters;
pub mod drivers;
