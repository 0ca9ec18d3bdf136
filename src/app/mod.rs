//! Application core: pure domain logic, zero I/O.
//!
//! The controller in [`service`] owns the wake cycle: it routes inbound
//! [`commands`], drives the pump FSM and the breakers, and reports what it
//! did as [`events`].
//! All interaction with hardware happens through **port traits** defined
//! in [`ports`], keeping this layer fully testable without real peripherals.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
