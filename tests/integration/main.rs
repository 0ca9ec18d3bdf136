//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that drives a whole wake cycle of the
//! [`DeviceController`](solarstation::app::service::DeviceController)
//! against the mock board and broker in `mock_hw`.  All tests run on the
//! host (x86_64) with no real hardware required.

mod handshake_flow_tests;
mod mock_hw;
mod pump_cycle_tests;
