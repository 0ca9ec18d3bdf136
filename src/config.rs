//! Device policy parameters.
//!
//! Every threshold, interval and budget the controller uses lives here.
//! The values are deployment constants, not derived quantities: they are
//! tuned to the battery divider, the pump and the broker the station talks
//! to.  The handshake payload never changes them.

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Core device settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSettings {
    // --- Battery ---
    /// Raw ADC level below which the pump may not be started (≈3.6 V).
    pub pump_safe_level: u16,
    /// Raw ADC level below which the device sleeps indefinitely (≈3.3 V).
    pub survival_level: u16,

    // --- Reliable delivery ---
    /// Minimum gap between two sends of the same message kind.
    pub resend_interval_ms: u32,
    /// Shared publish-attempt ceiling; reaching it forces a shutdown.
    pub max_publish_attempts: i32,
    /// Attempts credited at handshake when the pump will run.
    pub pump_active_credit: i32,
    /// Attempts credited at handshake when the pump stays off.
    pub pump_idle_credit: i32,

    // --- Timing ---
    /// Telemetry cadence while the pump is running.
    pub pump_telemetry_interval_ms: u32,
    /// Telemetry cadence in upload mode.
    pub upload_telemetry_interval_ms: u32,
    /// Activity budget after the last handshake before a forced shutdown.
    pub force_sleep_after_ms: u32,
    /// Delay between clearing the session and entering low-power mode.
    pub sleep_settle_ms: u32,

    // --- Link loss ---
    /// Reconnect attempts after which the pump is switched off.
    pub link_pump_off_attempts: u32,
    /// Reconnect attempts after which the device gives up and sleeps.
    pub link_shutdown_attempts: u32,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            // Battery (100k + 22k + 4.4k divider on A0)
            pump_safe_level: 890,
            survival_level: 817, // 816 and below

            // Reliable delivery
            resend_interval_ms: 1_000,
            max_publish_attempts: 50,
            pump_active_credit: 6,
            pump_idle_credit: 4,

            // Timing
            pump_telemetry_interval_ms: 1_000,
            upload_telemetry_interval_ms: 10_000,
            force_sleep_after_ms: 15 * 60 * 1_000,
            sleep_settle_ms: 1_000,

            // Link loss
            link_pump_off_attempts: 10,
            link_shutdown_attempts: 500,
        }
    }
}

impl DeviceSettings {
    /// Reject combinations the controller cannot operate with.
    pub fn validate(&self) -> Result<(), Error> {
        if self.survival_level >= self.pump_safe_level {
            return Err(Error::Config("survival_level must be below pump_safe_level"));
        }
        if self.resend_interval_ms == 0 {
            return Err(Error::Config("resend_interval_ms must be non-zero"));
        }
        if self.pump_telemetry_interval_ms == 0 || self.upload_telemetry_interval_ms == 0 {
            return Err(Error::Config("telemetry intervals must be non-zero"));
        }
        if self.max_publish_attempts <= 0 {
            return Err(Error::Config("max_publish_attempts must be positive"));
        }
        if self.pump_active_credit < 0 || self.pump_idle_credit < 0 {
            return Err(Error::Config("credits must not be negative"));
        }
        if self.link_pump_off_attempts >= self.link_shutdown_attempts {
            return Err(Error::Config("link_pump_off_attempts must be below link_shutdown_attempts"));
        }
        Ok(())
    }
}
