//! SolarStation firmware library.
//!
//! A battery-powered, solar-charged irrigation station: it wakes, shakes
//! hands with the home-automation server over MQTT, optionally runs the
//! water pump, reports telemetry and goes back to deep sleep.
//!
//! Exposes the pure-logic modules for integration testing and external
//! inspection.  All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod battery;
pub mod config;
pub mod error;
pub mod fsm;
pub mod handshake;
pub mod power;
pub mod protocol;
pub mod publisher;
pub mod safety;
pub mod telemetry;

pub mod pins;

// Board-facing modules; each carries host simulation stubs so the crate
// builds and tests off-target.
pub mod adapters;
pub mod drivers;
