//! Hardware adapter: bridges real peripherals to domain port traits.
//!
//! Owns the relay, status LED, battery sense and clock, and exposes them
//! through the board-side ports ([`ClockPort`], [`BatteryPort`],
//! [`ActuatorPort`], [`PowerPort`], [`DeviceInfoPort`]).  This is the only
//! module in the system that touches actual hardware.  On non-espidf
//! targets the underlying drivers use cfg-gated simulation stubs and
//! `deep_sleep` returns after recording the mode.

use embedded_hal::digital::OutputPin;
use log::info;

use crate::adapters::device_id::{self, MacAddress};
use crate::adapters::time::Esp32TimeAdapter;
use crate::app::ports::{
    ActuatorPort, BatteryPort, ClockPort, DeviceInfo, DeviceInfoPort, PowerPort,
};
use crate::drivers::battery_adc::BatterySense;
use crate::drivers::pump::PumpRelay;
use crate::drivers::status_led::StatusLed;
use crate::power::SleepMode;
use crate::telemetry::wifi_quality;

/// Concrete adapter that combines all hardware behind port traits.
pub struct HardwareAdapter<P, L> {
    pump: PumpRelay<P>,
    led: StatusLed<L>,
    battery: BatterySense,
    clock: Esp32TimeAdapter,
    mac: MacAddress,
    cpu_mhz: u16,
    ip: heapless::String<16>,
    rssi: Option<i8>,
    last_sleep: Option<SleepMode>,
}

impl<P: OutputPin, L: OutputPin> HardwareAdapter<P, L> {
    pub fn new(pump: PumpRelay<P>, led: StatusLed<L>, mac: MacAddress, cpu_mhz: u16) -> Self {
        Self {
            pump,
            led,
            battery: BatterySense::new(),
            clock: Esp32TimeAdapter::new(),
            mac,
            cpu_mhz,
            ip: heapless::String::new(),
            rssi: None,
            last_sleep: None,
        }
    }

    /// Refresh the link facts reported in telemetry.
    pub fn set_network(&mut self, ip: &str, rssi: Option<i8>) {
        self.ip.clear();
        let _ = self.ip.push_str(ip);
        self.rssi = rssi;
    }

    pub fn pump_is_on(&self) -> bool {
        self.pump.is_on()
    }

    pub fn led_is_lit(&self) -> bool {
        self.led.is_lit()
    }

    /// Mode of the most recent `deep_sleep` (host only ever sees this set).
    pub fn last_sleep(&self) -> Option<SleepMode> {
        self.last_sleep
    }
}

// ── Board ports ───────────────────────────────────────────────

impl<P, L> ClockPort for HardwareAdapter<P, L> {
    fn now_ms(&self) -> u64 {
        self.clock.uptime_ms()
    }
}

impl<P, L> BatteryPort for HardwareAdapter<P, L> {
    fn read_battery_raw(&mut self) -> u16 {
        self.battery.read()
    }
}

impl<P: OutputPin, L: OutputPin> ActuatorPort for HardwareAdapter<P, L> {
    fn set_pump(&mut self, on: bool) {
        self.pump.set(on);
    }

    fn set_status_led(&mut self, on: bool) {
        self.led.set(on);
    }
}

impl<P: OutputPin, L: OutputPin> PowerPort for HardwareAdapter<P, L> {
    #[cfg(target_os = "espidf")]
    fn settle(&mut self, ms: u32) {
        esp_idf_hal::delay::FreeRtos::delay_ms(ms);
    }

    #[cfg(not(target_os = "espidf"))]
    fn settle(&mut self, ms: u32) {
        info!("Power(sim): settle {} ms", ms);
    }

    fn deep_sleep(&mut self, mode: SleepMode) {
        self.pump.set(false);
        self.led.set(false);
        self.last_sleep = Some(mode);
        info!("Power: entering deep sleep ({})", mode);
        enter_deep_sleep(mode);
    }
}

#[cfg(target_os = "espidf")]
fn enter_deep_sleep(mode: SleepMode) {
    // SAFETY: both calls hand control to the ROM sleep path and never
    // return; the next boot is a fresh reset.
    unsafe {
        match mode {
            SleepMode::Timed { duration_us } => esp_idf_svc::sys::esp_deep_sleep(duration_us),
            SleepMode::Indefinite => esp_idf_svc::sys::esp_deep_sleep_start(),
        }
    }
}

#[cfg(not(target_os = "espidf"))]
fn enter_deep_sleep(_mode: SleepMode) {}

impl<P, L> DeviceInfoPort for HardwareAdapter<P, L> {
    fn device_info(&self) -> DeviceInfo {
        let mut ip = heapless::String::new();
        let _ = ip.push_str(if self.ip.is_empty() { "0.0.0.0" } else { self.ip.as_str() });
        DeviceInfo {
            name: device_id::station_name(&self.mac),
            ip,
            mac: device_id::mac_string(&self.mac),
            wifi_quality: self.rssi.map_or(0, |r| wifi_quality(i32::from(r))),
            cpu_mhz: self.cpu_mhz,
        }
    }
}
