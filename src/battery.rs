//! Battery monitor.
//!
//! The 18650 cell is read through a resistive divider on one ADC input.
//! Two fixed levels split the reading into three bands:
//!
//! ```text
//!   raw ≥ pump_safe          normal operation
//!   survival ≤ raw < pump_safe   may wake/report, may NOT run the pump
//!   raw < survival           hard cutoff: report once, sleep forever
//! ```
//!
//! Each sample is a fresh snapshot; nothing is averaged.

use crate::app::ports::BatteryPort;
use crate::config::DeviceSettings;

/// One classified battery reading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatteryState {
    pub raw_level: u16,
    /// Below the pump-safe level.
    pub pump_cutoff: bool,
    /// Below the survival level.
    pub hard_cutoff: bool,
}

impl BatteryState {
    /// Merge a newer reading into this one.  Cutoff flags latch: once a
    /// cycle has seen a cutoff it keeps it until the next wake.
    pub fn latch(self, newer: BatteryState) -> BatteryState {
        BatteryState {
            raw_level: newer.raw_level,
            pump_cutoff: self.pump_cutoff || newer.pump_cutoff,
            hard_cutoff: self.hard_cutoff || newer.hard_cutoff,
        }
    }
}

/// Maps raw readings against the two configured levels.
#[derive(Debug, Clone, Copy)]
pub struct BatteryMonitor {
    pump_safe_level: u16,
    survival_level: u16,
}

impl BatteryMonitor {
    pub fn new(settings: &DeviceSettings) -> Self {
        Self {
            pump_safe_level: settings.pump_safe_level,
            survival_level: settings.survival_level,
        }
    }

    /// Read the ADC once and classify the result.
    pub fn sample(&self, port: &mut impl BatteryPort) -> BatteryState {
        self.classify(port.read_battery_raw())
    }

    /// Pure classification.  Out-of-range readings pass straight through.
    pub fn classify(&self, raw_level: u16) -> BatteryState {
        BatteryState {
            raw_level,
            pump_cutoff: raw_level < self.pump_safe_level,
            hard_cutoff: raw_level < self.survival_level,
        }
    }
}
