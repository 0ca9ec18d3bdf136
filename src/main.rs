//! SolarStation Firmware: Main Entry Point
//!
//! Hexagonal architecture, one wake cycle per boot.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HardwareAdapter        LogEventSink     MqttAdapter           │
//! │  (Clock+Battery+        (EventSink)      (PublishPort,         │
//! │   Actuator+Power+Info)                    inbound queue)       │
//! │  WifiAdapter (Connectivity)                                    │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │            DeviceController (pure logic)               │    │
//! │  │  Handshake · Ack ledger · Pump FSM · Cutoffs · Sleep   │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The cycle ends in `esp_deep_sleep`, so the loop below never exits on
//! its own; the next wake is a reset back into `main`.
#![deny(unused_must_use)]

use anyhow::{Result, bail};
use esp_idf_hal::gpio::{AnyOutputPin, PinDriver};
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::EspWifi;
use log::{error, info, warn};

use solarstation::adapters::device_id;
use solarstation::adapters::hardware::HardwareAdapter;
use solarstation::adapters::log_sink::LogEventSink;
use solarstation::adapters::mqtt::MqttAdapter;
use solarstation::adapters::wifi::{ConnectivityPort, WifiAdapter};
use solarstation::app::ports::ClockPort;
use solarstation::app::service::DeviceController;
use solarstation::config::DeviceSettings;
use solarstation::drivers::hw_init;
use solarstation::drivers::pump::PumpRelay;
use solarstation::drivers::status_led::StatusLed;
use solarstation::drivers::watchdog::Watchdog;
use solarstation::pins;
use solarstation::safety::LinkAction;

/// Network credentials baked in at build time.
const WIFI_SSID: &str = match option_env!("SOLARSTATION_WIFI_SSID") {
    Some(s) => s,
    None => "",
};
const WIFI_PASSWORD: &str = match option_env!("SOLARSTATION_WIFI_PASSWORD") {
    Some(s) => s,
    None => "",
};
const MQTT_URL: &str = match option_env!("SOLARSTATION_MQTT_URL") {
    Some(s) => s,
    None => "mqtt://192.168.1.10:1883",
};

const LOOP_PERIOD_MS: u32 = 10;

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  SolarStation v{}                  ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Peripherals: relay and LED first so the pump is off ─
    let peripherals = Peripherals::take()?;
    // SAFETY: the pin numbers come from `pins` and are not claimed
    // through `peripherals.pins` anywhere else.
    let relay_pin = PinDriver::output(unsafe { AnyOutputPin::new(pins::PUMP_RELAY_GPIO) })?;
    let led_pin = PinDriver::output(unsafe { AnyOutputPin::new(pins::STATUS_LED_GPIO) })?;
    let pump = PumpRelay::new(relay_pin);
    let led = StatusLed::new(led_pin, pins::STATUS_LED_ACTIVE_LOW);

    if let Err(e) = hw_init::init_peripherals() {
        // Without the battery reading the cutoffs cannot be honoured.
        error!("HAL init failed: {}", e);
        bail!(e);
    }
    let mut watchdog = Watchdog::default();

    let mac = device_id::read_mac();
    info!("Station: {} ({})", device_id::station_name(&mac), device_id::mac_string(&mac));
    let mut hw = HardwareAdapter::new(pump, led, mac, pins::CPU_FREQ_MHZ);

    // ── 3. Controller ─────────────────────────────────────────
    let mut sink = LogEventSink::new();
    let mut controller = DeviceController::new(DeviceSettings::default())?;
    controller.start(&mut hw, &mut sink);

    // ── 4. Network ────────────────────────────────────────────
    let sysloop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;
    let driver = EspWifi::new(peripherals.modem, sysloop, Some(nvs))?;
    let mut wifi = WifiAdapter::new(driver);
    wifi.set_credentials(WIFI_SSID, WIFI_PASSWORD)?;
    if let Err(e) = wifi.connect() {
        warn!("WiFi: initial connect failed ({}), retrying in loop", e);
    }

    let name = device_id::station_name(&mac);
    let mut mqtt = MqttAdapter::connect(MQTT_URL, name.as_str())?;

    info!("System ready. Entering control loop.");

    // ── 5. Control loop ───────────────────────────────────────
    let mut link_action = LinkAction::None;
    loop {
        let now = hw.now_ms();
        wifi.poll(now);
        mqtt.poll();
        hw.set_network(wifi.ip(), wifi.rssi());

        mqtt.drain(|msg| {
            // Rejections are already logged and emitted by the controller.
            let _ = controller.on_message(msg.topic.as_str(), &msg.payload, &mut hw, &mut sink);
        });

        controller.tick(&mut hw, &mut mqtt, &mut sink);

        let wifi_attempts = wifi.reconnect_attempts();
        let mqtt_attempts = mqtt.reconnect_attempts();
        if wifi_attempts > 0 || mqtt_attempts > 0 {
            let action = controller.on_link_lost(wifi_attempts, mqtt_attempts, &mut hw, &mut mqtt, &mut sink);
            if action != link_action {
                warn!("Link lost (wifi={}, mqtt={}): {:?}", wifi_attempts, mqtt_attempts, action);
                link_action = action;
            }
        } else {
            link_action = LinkAction::None;
        }

        if controller.is_asleep() {
            // Only reachable if deep sleep failed to take.
            watchdog.release();
            error!("Deep sleep returned; restarting");
            esp_idf_hal::reset::restart();
        }

        watchdog.feed();
        esp_idf_hal::delay::FreeRtos::delay_ms(LOOP_PERIOD_MS);
    }
}
