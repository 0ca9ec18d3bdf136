//! Mock board, broker and event sink for integration tests.
//!
//! The board records every actuator and power call with the clock value
//! at which it happened, so tests can assert on the full timeline without
//! touching real GPIO.  The broker records publishes and can play the
//! server by acknowledging whatever the device sends.

use solarstation::app::events::AppEvent;
use solarstation::app::ports::{
    ActuatorPort, BatteryPort, ClockPort, DeviceInfo, DeviceInfoPort, EventSink, PowerPort,
    PublishPort,
};
use solarstation::app::service::DeviceController;
use solarstation::config::DeviceSettings;
use solarstation::error::PublishError;
use solarstation::power::SleepMode;
use solarstation::protocol;
use solarstation::publisher::AckKind;

// ── Board ─────────────────────────────────────────────────────

pub struct MockBoard {
    pub now_ms: u64,
    pub battery_raw: u16,
    pub pump: bool,
    pub led: bool,
    /// `(time, on)` for every change of the relay output.
    pub pump_edges: Vec<(u64, bool)>,
    pub settles: Vec<u32>,
    pub sleeps: Vec<SleepMode>,
    pub battery_reads: u32,
}

#[allow(dead_code)]
impl MockBoard {
    pub fn new(battery_raw: u16) -> Self {
        Self {
            now_ms: 0,
            battery_raw,
            pump: false,
            led: false,
            pump_edges: Vec::new(),
            settles: Vec::new(),
            sleeps: Vec::new(),
            battery_reads: 0,
        }
    }

    /// Total time the relay was energised.
    pub fn pump_on_ms(&self) -> u64 {
        let mut total = 0;
        let mut since = None;
        for &(t, on) in &self.pump_edges {
            match (on, since) {
                (true, None) => since = Some(t),
                (false, Some(s)) => {
                    total += t - s;
                    since = None;
                }
                _ => {}
            }
        }
        if let Some(s) = since {
            total += self.now_ms - s;
        }
        total
    }

    pub fn pump_ever_on(&self) -> bool {
        self.pump_edges.iter().any(|&(_, on)| on)
    }
}

impl ClockPort for MockBoard {
    fn now_ms(&self) -> u64 {
        self.now_ms
    }
}

impl BatteryPort for MockBoard {
    fn read_battery_raw(&mut self) -> u16 {
        self.battery_reads += 1;
        self.battery_raw
    }
}

impl ActuatorPort for MockBoard {
    fn set_pump(&mut self, on: bool) {
        if on != self.pump {
            self.pump_edges.push((self.now_ms, on));
        }
        self.pump = on;
    }

    fn set_status_led(&mut self, on: bool) {
        self.led = on;
    }
}

impl PowerPort for MockBoard {
    fn settle(&mut self, ms: u32) {
        self.settles.push(ms);
    }

    fn deep_sleep(&mut self, mode: SleepMode) {
        self.sleeps.push(mode);
    }
}

impl DeviceInfoPort for MockBoard {
    fn device_info(&self) -> DeviceInfo {
        let mut info = DeviceInfo::default();
        let _ = info.name.push_str("solarstation-test");
        let _ = info.ip.push_str("10.0.0.7");
        let _ = info.mac.push_str("24:0A:C4:00:00:01");
        info.wifi_quality = 80;
        info.cpu_mhz = 160;
        info
    }
}

// ── Broker ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub at_ms: u64,
    pub topic: String,
    pub payload: Vec<u8>,
}

#[allow(dead_code)]
impl Published {
    pub fn text(&self) -> &str {
        core::str::from_utf8(&self.payload).unwrap_or("")
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.payload).unwrap_or(serde_json::Value::Null)
    }

    /// The ack token the server would answer this message with.
    pub fn ack_kind(&self) -> Option<AckKind> {
        match self.topic.as_str() {
            protocol::POWER_TOPIC => match self.json()["state"].as_str() {
                Some("ON") => Some(AckKind::OnState),
                Some("OFF") => Some(AckKind::OffState),
                _ => None,
            },
            protocol::PUMP_POWER_TOPIC => match self.text() {
                "ON" => Some(AckKind::PumpOn),
                "OFF" => Some(AckKind::PumpOff),
                _ => None,
            },
            protocol::PUMP_ACTIVE_STAT_TOPIC => Some(AckKind::PumpActiveOff),
            protocol::STATE_TOPIC => Some(AckKind::SensorState),
            _ => None,
        }
    }
}

pub struct MockBroker {
    /// Clock shared with the board, stamped on each publish.
    pub now_ms: u64,
    pub connected: bool,
    pub published: Vec<Published>,
    pub failed: u32,
}

#[allow(dead_code)]
impl MockBroker {
    pub fn new() -> Self {
        Self {
            now_ms: 0,
            connected: true,
            published: Vec::new(),
            failed: 0,
        }
    }

    pub fn on(&self, topic: &str) -> Vec<&Published> {
        self.published.iter().filter(|p| p.topic == topic).collect()
    }

    pub fn count(&self, topic: &str) -> usize {
        self.on(topic).len()
    }

    pub fn count_kind(&self, kind: AckKind) -> usize {
        self.published.iter().filter(|p| p.ack_kind() == Some(kind)).count()
    }
}

impl PublishPort for MockBroker {
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), PublishError> {
        if !self.connected {
            self.failed += 1;
            return Err(PublishError::Disconnected);
        }
        self.published.push(Published {
            at_ms: self.now_ms,
            topic: topic.to_string(),
            payload: payload.to_vec(),
        });
        Ok(())
    }
}

// ── Event sink ────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── Station harness ───────────────────────────────────────────

/// What the simulated server answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Server {
    /// Acknowledge every reliable message.
    AckAll,
    /// Acknowledge everything except these kinds.
    AckAllBut(&'static [AckKind]),
    /// Stay silent.
    Silent,
}

pub const TICK_MS: u64 = 100;

/// A controller wired to the mocks, plus a scripted server.
pub struct Station {
    pub ctl: DeviceController,
    pub hw: MockBoard,
    pub broker: MockBroker,
    pub sink: RecordingSink,
    pub server: Server,
    /// Handshake sent in answer to the first acknowledged `ON`.
    pub handshake: Option<Vec<u8>>,
    seen: usize,
}

#[allow(dead_code)]
impl Station {
    pub fn new(battery_raw: u16) -> Self {
        Self::with_settings(DeviceSettings::default(), battery_raw)
    }

    pub fn with_settings(settings: DeviceSettings, battery_raw: u16) -> Self {
        let mut st = Self {
            ctl: DeviceController::new(settings).unwrap(),
            hw: MockBoard::new(battery_raw),
            broker: MockBroker::new(),
            sink: RecordingSink::default(),
            server: Server::AckAll,
            handshake: None,
            seen: 0,
        };
        st.ctl.start(&mut st.hw, &mut st.sink);
        st
    }

    pub fn now(&self) -> u64 {
        self.hw.now_ms
    }

    pub fn advance(&mut self, ms: u64) {
        self.hw.now_ms += ms;
        self.broker.now_ms = self.hw.now_ms;
    }

    pub fn tick(&mut self) {
        self.ctl.tick(&mut self.hw, &mut self.broker, &mut self.sink);
    }

    pub fn deliver(&mut self, topic: &str, payload: &[u8]) -> Result<(), solarstation::error::ParseError> {
        self.ctl.on_message(topic, payload, &mut self.hw, &mut self.sink)
    }

    pub fn ack(&mut self, kind: AckKind) {
        self.deliver(protocol::ACK_TOPIC, kind.token().as_bytes()).unwrap();
    }

    /// Answer everything published since the last call, the way the
    /// server would.
    pub fn respond(&mut self) {
        let fresh: Vec<AckKind> = self.broker.published[self.seen..]
            .iter()
            .filter_map(Published::ack_kind)
            .collect();
        self.seen = self.broker.published.len();
        for kind in fresh {
            let answer = match self.server {
                Server::AckAll => true,
                Server::AckAllBut(skip) => !skip.contains(&kind),
                Server::Silent => false,
            };
            if answer {
                self.ack(kind);
            }
            if kind == AckKind::OnState && answer && !self.ctl.config_received() {
                if let Some(cfg) = self.handshake.clone() {
                    self.deliver(protocol::CONFIG_TOPIC, &cfg).unwrap();
                }
            }
        }
    }

    /// One loop iteration: advance, tick, let the server answer.
    pub fn step(&mut self) {
        self.advance(TICK_MS);
        self.tick();
        self.respond();
    }

    /// Step until the controller sleeps or `max_ms` of simulated time
    /// has passed.  Returns whether it slept.
    pub fn run_until_asleep(&mut self, max_ms: u64) -> bool {
        let deadline = self.now() + max_ms;
        while !self.ctl.is_asleep() && self.now() < deadline {
            self.step();
        }
        self.ctl.is_asleep()
    }
}

/// Build a handshake payload.
pub fn config_json(upload: bool, pump: bool, pump_seconds: u32, sleep_minutes: u32) -> Vec<u8> {
    serde_json::json!({
        "time": "2024-06-01T06:00:00",
        "upload_mode": if upload { "ON" } else { "OFF" },
        "pump_active": if pump { "ON" } else { "OFF" },
        "pump_seconds": pump_seconds,
        "esp_sleep_time_minutes": sleep_minutes,
    })
    .to_string()
    .into_bytes()
}
