//! Device identity derived from the ESP32 factory MAC address.
//!
//! The station reports itself in every telemetry frame as `Whoami`
//! (`solarstation-xxyyzz`, from the last 3 MAC bytes) and `MAC`
//! (colon-separated, upper-case).  Both are stable across reboots and
//! deep-sleep wakes because the MAC is burned into eFuse.

use core::fmt::Write;

/// Full 6-byte MAC address.
pub type MacAddress = [u8; 6];

/// `AA:BB:CC:DD:EE:FF`.
pub type MacString = heapless::String<18>;

/// `solarstation-xxyyzz`.
pub type StationName = heapless::String<32>;

/// Read the factory MAC address from eFuse.
#[cfg(target_os = "espidf")]
pub fn read_mac() -> MacAddress {
    let mut mac: MacAddress = [0u8; 6];
    // SAFETY: the buffer is exactly the 6 bytes the call writes.
    unsafe {
        esp_idf_svc::sys::esp_efuse_mac_get_default(mac.as_mut_ptr());
    }
    mac
}

/// Simulation: returns a deterministic fake MAC.
#[cfg(not(target_os = "espidf"))]
pub fn read_mac() -> MacAddress {
    [0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE]
}

pub fn mac_string(mac: &MacAddress) -> MacString {
    let mut s = MacString::new();
    let _ = write!(
        s,
        "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
        mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
    );
    s
}

/// Hostname and telemetry identity.
pub fn station_name(mac: &MacAddress) -> StationName {
    let mut name = StationName::new();
    let _ = write!(name, "solarstation-{:02x}{:02x}{:02x}", mac[3], mac[4], mac[5]);
    name
}
