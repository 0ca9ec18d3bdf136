//! Device-state telemetry frame.
//!
//! Published on `tele/solarstation/STATE`, both as the acknowledged
//! `SensorState` message and as the unacknowledged periodic report while
//! the pump runs or the device is in upload mode.  Field names follow the
//! server's dashboard, including the upper-case ones.

use serde::Serialize;

use crate::app::ports::DeviceInfo;
use crate::battery::BatteryState;
use crate::handshake::DeviceConfig;

pub const FIRMWARE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Telemetry<'a> {
    #[serde(rename = "Whoami")]
    pub whoami: &'a str,
    #[serde(rename = "IP")]
    pub ip: &'a str,
    #[serde(rename = "MAC")]
    pub mac: &'a str,
    pub ver: &'a str,
    pub time: &'a str,
    /// Signal quality, percent.
    pub wifi: u8,
    pub battery: u16,
    /// CPU clock, MHz.
    pub frequency: u16,
    pub remaining_seconds: i32,
    /// Raw level, present only while the hard cutoff is active.
    #[serde(rename = "HARD_CUT_OFF", skip_serializing_if = "Option::is_none")]
    pub hard_cut_off: Option<u16>,
    /// Raw level, present only while the pump cutoff is active.
    #[serde(rename = "WATER_PUMP_CUT_OFF", skip_serializing_if = "Option::is_none")]
    pub water_pump_cut_off: Option<u16>,
}

impl<'a> Telemetry<'a> {
    pub fn new(
        info: &'a DeviceInfo,
        config: &'a DeviceConfig,
        battery: BatteryState,
        remaining_seconds: i32,
    ) -> Self {
        Self {
            whoami: info.name.as_str(),
            ip: info.ip.as_str(),
            mac: info.mac.as_str(),
            ver: FIRMWARE_VERSION,
            time: config.timestamp.as_str(),
            wifi: info.wifi_quality,
            battery: battery.raw_level,
            frequency: info.cpu_mhz,
            remaining_seconds,
            hard_cut_off: battery.hard_cutoff.then_some(battery.raw_level),
            water_pump_cut_off: battery.pump_cutoff.then_some(battery.raw_level),
        }
    }

    pub fn to_vec(&self) -> Vec<u8> {
        // Strings and integers only; serialisation cannot fail.
        serde_json::to_vec(self).unwrap_or_default()
    }
}

/// Signal quality in percent from RSSI in dBm.
pub fn wifi_quality(rssi_dbm: i32) -> u8 {
    if rssi_dbm <= -100 {
        0
    } else if rssi_dbm >= -50 {
        100
    } else {
        (2 * (rssi_dbm + 100)) as u8
    }
}
