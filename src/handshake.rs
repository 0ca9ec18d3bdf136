//! Configuration handshake.
//!
//! Once per wake cycle the server answers the `ON` announcement with a
//! full operating configuration on `stat/solarstation/CONFIG` (QoS 1, so
//! the broker may deliver it again after a reconnect):
//!
//! ```json
//! { "time": "12:30", "upload_mode": "OFF", "pump_active": "ON",
//!   "pump_seconds": "5", "esp_sleep_time_minutes": "10" }
//! ```
//!
//! Applying it is all-or-nothing: a payload that fails to parse leaves the
//! context exactly as it was.

use core::fmt::Write as _;

use log::{info, warn};
use serde_json::{Map, Value};

use crate::battery::BatteryState;
use crate::error::ParseError;
use crate::fsm::context::DeviceContext;
use crate::protocol::ON_CMD;

/// `sleep_duration_us` value meaning "sleep until reset".
pub const SLEEP_FOREVER: u64 = 0;

/// Shortest timed sleep.
const MIN_SLEEP_US: u64 = 1_000_000;

/// Sleep requests of this many minutes or more mean "forever".
const FOREVER_MINUTES: f64 = 61.0;

/// Operating parameters received in one handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    /// Stay awake and only report telemetry.
    pub upload_mode: bool,
    pub pump_activation_requested: bool,
    pub pump_on_duration_ms: u32,
    /// [`SLEEP_FOREVER`] or a timed sleep in microseconds.
    pub sleep_duration_us: u64,
    /// Server wall-clock string, echoed back in telemetry.
    pub timestamp: heapless::String<32>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        let mut timestamp = heapless::String::new();
        let _ = timestamp.push_str("OFF");
        Self {
            upload_mode: false,
            pump_activation_requested: false,
            pump_on_duration_ms: 10_000,
            sleep_duration_us: 600_000_000,
            timestamp,
        }
    }
}

impl DeviceConfig {
    pub fn sleeps_forever(&self) -> bool {
        self.sleep_duration_us == SLEEP_FOREVER
    }
}

/// Map the server's minutes value to a sleep duration.
///
/// The lower bound is checked first: `< 1` sleeps one second, `≥ 61`
/// sleeps forever, anything in between sleeps that many minutes.
pub fn sleep_duration_us(minutes: f64) -> u64 {
    if minutes < 1.0 {
        MIN_SLEEP_US
    } else if minutes >= FOREVER_MINUTES {
        SLEEP_FOREVER
    } else {
        (minutes * 60.0 * 1_000_000.0) as u64
    }
}

/// Decode a handshake payload.
pub fn parse_config(payload: &[u8]) -> Result<DeviceConfig, ParseError> {
    let value: Value =
        serde_json::from_slice(payload).map_err(|_| ParseError::Malformed("invalid JSON"))?;
    let obj = value
        .as_object()
        .ok_or(ParseError::Malformed("config is not an object"))?;

    let upload_mode = switch_field(obj, "upload_mode")?;
    let pump_activation_requested = switch_field(obj, "pump_active")?;
    let pump_seconds = number_field(obj, "pump_seconds")?;
    let sleep_minutes = number_field(obj, "esp_sleep_time_minutes")?;

    let mut timestamp = heapless::String::<32>::new();
    let time = obj.get("time").and_then(Value::as_str).unwrap_or("OFF");
    for c in time.chars() {
        if timestamp.write_char(c).is_err() {
            break;
        }
    }

    Ok(DeviceConfig {
        upload_mode,
        pump_activation_requested,
        pump_on_duration_ms: (pump_seconds * 1000.0) as u32,
        sleep_duration_us: sleep_duration_us(sleep_minutes),
        timestamp,
    })
}

fn switch_field(obj: &Map<String, Value>, field: &'static str) -> Result<bool, ParseError> {
    match obj.get(field) {
        Some(Value::String(s)) => Ok(s.trim() == ON_CMD),
        Some(Value::Bool(b)) => Ok(*b),
        _ => Err(ParseError::Malformed(field)),
    }
}

fn number_field(obj: &Map<String, Value>, field: &'static str) -> Result<f64, ParseError> {
    let n = match obj.get(field) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match n {
        Some(v) if v.is_finite() && v >= 0.0 => Ok(v),
        _ => Err(ParseError::Malformed(field)),
    }
}

/// Parse `payload` and install it as the cycle's configuration.
///
/// On success, in one step: the configuration is replaced, every session
/// timer restarts at `now_ms`, the battery is re-sampled through `sample`
/// to fix the pump cutoff for the cycle, and the pump countdown is re-armed.
/// The first handshake of a cycle also clears pending acknowledgments and
/// applies the retry credit; a redelivered handshake does not.
pub fn apply(
    ctx: &mut DeviceContext,
    payload: &[u8],
    now_ms: u64,
    sample: impl FnOnce() -> BatteryState,
) -> Result<DeviceConfig, ParseError> {
    let config = match parse_config(payload) {
        Ok(c) => c,
        Err(e) => {
            warn!("HANDSHAKE rejected: {} (keeping previous config)", e);
            return Err(e);
        }
    };

    let redelivered = ctx.config_received;
    if !redelivered {
        ctx.acks.reset_for_handshake();
        let credit = if config.pump_activation_requested {
            ctx.settings.pump_active_credit
        } else {
            ctx.settings.pump_idle_credit
        };
        ctx.acks.apply_credit(credit);
    }

    ctx.acks.reset_timers(now_ms);
    ctx.session.reset(now_ms);
    // A redelivery keeps any cutoff this cycle has already seen.
    ctx.battery = if redelivered {
        ctx.battery.latch(sample())
    } else {
        sample()
    };
    ctx.pump.arm(config.pump_activation_requested, config.pump_on_duration_ms);
    ctx.upload_mode = config.upload_mode;
    ctx.config = config.clone();
    ctx.config_received = true;

    info!(
        "HANDSHAKE applied: upload={} pump={} for {}ms, sleep={}us, battery={}{}",
        config.upload_mode,
        config.pump_activation_requested,
        config.pump_on_duration_ms,
        config.sleep_duration_us,
        ctx.battery.raw_level,
        if ctx.battery.pump_cutoff { " (pump cutoff)" } else { "" },
    );
    Ok(config)
}
