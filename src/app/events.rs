//! Outbound application events.
//!
//! The [`DeviceController`](super::service::DeviceController) emits these
//! through the [`EventSink`](super::ports::EventSink) port.  Adapters on
//! the other side decide what to do with them; on the board they become
//! log lines.

use crate::error::{ParseError, ShutdownCause};
use crate::fsm::StateId;
use crate::power::SleepMode;
use crate::publisher::AckKind;

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// The controller has started a wake cycle.
    Started,

    /// The pump FSM moved between states.
    StateChanged { from: StateId, to: StateId },

    /// A handshake was accepted.
    HandshakeApplied {
        upload_mode: bool,
        pump_requested: bool,
        /// Credit and ack reset applied (first handshake of the cycle).
        fresh: bool,
    },

    /// A handshake or command payload was rejected; state unchanged.
    HandshakeRejected(ParseError),

    /// The server acknowledged a message for the first time.
    AckReceived(AckKind),

    /// Upload mode switched on or off.
    UploadMode(bool),

    /// A telemetry frame was published.
    Telemetry(TelemetrySummary),

    /// A breaker ended the cycle without waiting for the server.
    ForcedShutdown(ShutdownCause),

    /// The board was put to sleep.
    SleepEntered(SleepMode),
}

/// The numbers from a telemetry frame worth logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelemetrySummary {
    pub battery: u16,
    pub pump_cutoff: bool,
    pub hard_cutoff: bool,
    pub remaining_secs: i32,
    /// Sent as the acknowledged `SensorState` message.
    pub acknowledged: bool,
}
