//! Battery voltage sense.
//!
//! The pack is read through a resistive divider on an ADC1 channel.  The
//! cutoff thresholds were calibrated on a 10-bit converter, so readings
//! are scaled down from the ESP32's native 12 bits before they leave
//! this driver.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: reads the battery channel via the oneshot API (initialised
//! by hw_init).
//! On host/test: reads from a static `AtomicU16` for injection.

#[cfg(not(target_os = "espidf"))]
use core::sync::atomic::{AtomicU16, Ordering};

use crate::pins;

/// Full-scale 10-bit reading: a healthy pack in simulation.
#[cfg(not(target_os = "espidf"))]
static SIM_BATTERY_RAW: AtomicU16 = AtomicU16::new(1023);

#[cfg(not(target_os = "espidf"))]
pub fn sim_set_battery_raw(raw: u16) {
    SIM_BATTERY_RAW.store(raw, Ordering::Relaxed);
}

const SCALE_SHIFT: u32 = pins::BATTERY_ADC_BITS - pins::BATTERY_LEVEL_BITS;

#[derive(Debug, Default)]
pub struct BatterySense {
    last_raw: u16,
}

impl BatterySense {
    pub fn new() -> Self {
        Self::default()
    }

    /// One reading on the threshold scale.
    pub fn read(&mut self) -> u16 {
        self.last_raw = Self::read_level();
        self.last_raw
    }

    pub fn last(&self) -> u16 {
        self.last_raw
    }

    #[cfg(target_os = "espidf")]
    fn read_level() -> u16 {
        scale_native(crate::drivers::hw_init::adc1_read(pins::BATTERY_ADC_CHANNEL))
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_level() -> u16 {
        SIM_BATTERY_RAW.load(Ordering::Relaxed)
    }
}

/// Convert a native 12-bit sample to the threshold scale.
pub fn scale_native(native: u16) -> u16 {
    native >> SCALE_SHIFT
}
