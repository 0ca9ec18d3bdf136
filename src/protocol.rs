//! Wire protocol shared with the home-automation server.
//!
//! Channel names and payload spellings must match the server byte for
//! byte, including the historical `number_of_attemps` field.
//!
//! | Direction | Topic                      | Payload                         |
//! |-----------|----------------------------|---------------------------------|
//! | sub       | `cmnd/upload_mode/SLEEP`   | `ON`/`OFF` or JSON              |
//! | sub       | `cmnd/water_pump/ACTIVE`   | `ON`/`OFF` or JSON              |
//! | sub (Q1)  | `stat/solarstation/CONFIG` | handshake JSON                  |
//! | sub       | `stat/solarstation/ACK`    | token or `{"value": token}`     |
//! | pub       | `tele/solarstation/STATE`  | telemetry JSON                  |
//! | pub       | `stat/solarstation/POWER`  | `{"state":…,"number_of_attemps":…}` |
//! | pub       | `stat/water_pump/POWER`    | `ON`/`OFF`                      |
//! | pub       | `stat/water_pump/ACTIVE`   | `OFF`                           |

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

pub const UPLOAD_MODE_TOPIC: &str = "cmnd/upload_mode/SLEEP";
pub const PUMP_ACTIVE_CMND_TOPIC: &str = "cmnd/water_pump/ACTIVE";
pub const CONFIG_TOPIC: &str = "stat/solarstation/CONFIG";
pub const ACK_TOPIC: &str = "stat/solarstation/ACK";

pub const STATE_TOPIC: &str = "tele/solarstation/STATE";
pub const POWER_TOPIC: &str = "stat/solarstation/POWER";
pub const PUMP_POWER_TOPIC: &str = "stat/water_pump/POWER";
pub const PUMP_ACTIVE_STAT_TOPIC: &str = "stat/water_pump/ACTIVE";

/// Subscriptions made after every (re)connect, with their QoS level.
/// Only the handshake uses QoS 1 so the broker redelivers it.
pub const SUBSCRIPTIONS: [(&str, u8); 4] = [
    (UPLOAD_MODE_TOPIC, 0),
    (PUMP_ACTIVE_CMND_TOPIC, 0),
    (CONFIG_TOPIC, 1),
    (ACK_TOPIC, 0),
];

pub const ON_CMD: &str = "ON";
pub const OFF_CMD: &str = "OFF";

/// `stat/solarstation/POWER` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerState<'a> {
    pub state: &'a str,
    #[serde(rename = "number_of_attemps")]
    pub number_of_attempts: i32,
}

/// Announcement sent on wake.  The counter is always reported as zero.
pub fn power_on_payload() -> Vec<u8> {
    encode(&PowerState {
        state: ON_CMD,
        number_of_attempts: 0,
    })
}

/// Sign-off sent before sleeping, carrying the attempts spent this cycle.
pub fn power_off_payload(attempts: i32) -> Vec<u8> {
    encode(&PowerState {
        state: OFF_CMD,
        number_of_attempts: attempts,
    })
}

fn encode<T: Serialize>(value: &T) -> Vec<u8> {
    // Plain structs of strings and integers always serialise.
    serde_json::to_vec(value).unwrap_or_default()
}

// ───────────────────────────────────────────────────────────────
// Inbound decoding
// ───────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct Envelope<'a> {
    #[serde(borrow, default)]
    state: Option<&'a str>,
    #[serde(borrow, default)]
    value: Option<&'a str>,
}

/// Extract the command word from a raw or JSON-wrapped payload.
///
/// Accepts `ON`, `{"state":"ON"}` and `{"value":"ON"}`.
pub fn command_word(payload: &[u8]) -> Result<&str, ParseError> {
    let text = core::str::from_utf8(payload)
        .map_err(|_| ParseError::Malformed("payload is not UTF-8"))?
        .trim();
    if text.starts_with('{') {
        let env: Envelope<'_> =
            serde_json::from_str(text).map_err(|_| ParseError::Malformed("invalid JSON"))?;
        return env
            .state
            .or(env.value)
            .ok_or(ParseError::Malformed("missing state/value"));
    }
    if text.is_empty() {
        return Err(ParseError::Malformed("empty payload"));
    }
    Ok(text.trim_matches('"'))
}

/// Decode an `ON`/`OFF` switch command.  Anything but `ON` means off.
pub fn parse_switch(payload: &[u8]) -> Result<bool, ParseError> {
    Ok(command_word(payload)? == ON_CMD)
}
