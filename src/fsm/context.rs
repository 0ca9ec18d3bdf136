//! Shared mutable context threaded through every FSM handler.
//!
//! `DeviceContext` is the single struct that state handlers read from and
//! write to: the current handshake configuration, the battery snapshot,
//! the acknowledgment ledger, pump bookkeeping, session timers, and the
//! per-tick requests the controller applies after the FSM runs.  Nothing
//! in the crate keeps cycle state anywhere else.

use crate::battery::BatteryState;
use crate::config::DeviceSettings;
use crate::handshake::DeviceConfig;
use crate::power::SleepRequest;
use crate::publisher::{AckKind, AckLedger};

// ---------------------------------------------------------------------------
// Pump bookkeeping
// ---------------------------------------------------------------------------

/// What the pump is meant to do and what it is actually doing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpState {
    /// Server asked for a run this cycle.
    pub activation_intent: bool,
    /// Relay currently energised.
    pub powered: bool,
    /// Countdown reported in telemetry.
    pub remaining_secs: i32,
    /// When the relay was energised.
    pub on_since: u64,
    /// Last in-run telemetry publish.
    pub last_report_at: u64,
}

impl PumpState {
    /// Set up a new run from a handshake.  Drive state is untouched.
    pub fn arm(&mut self, intent: bool, duration_ms: u32) {
        self.activation_intent = intent;
        self.remaining_secs = (duration_ms / 1000) as i32;
    }
}

// ---------------------------------------------------------------------------
// Session timers
// ---------------------------------------------------------------------------

/// Timestamps that restart together at every handshake.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionClock {
    /// Base of the force-sleep deadline.
    pub handshake_at: u64,
    /// Last upload-mode telemetry publish.
    pub telemetry_at: u64,
}

impl SessionClock {
    pub fn reset(&mut self, now_ms: u64) {
        self.handshake_at = now_ms;
        self.telemetry_at = now_ms;
    }
}

// ---------------------------------------------------------------------------
// Per-tick requests (written by state handlers; applied by the controller)
// ---------------------------------------------------------------------------

/// Requests that state handlers write for the controller to carry out
/// after the FSM tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Commands {
    /// Desired relay output.  Persists across ticks.
    pub pump_on: bool,
    /// Reliable message to (re)send this tick.
    pub send: Option<AckKind>,
    /// Publish an unacknowledged telemetry frame this tick.
    pub telemetry: bool,
    /// End the cycle.
    pub sleep: Option<SleepRequest>,
}

impl Commands {
    /// Drop the one-shot requests; the pump output is level-triggered
    /// and stays.
    pub fn clear_requests(&mut self) {
        self.send = None;
        self.telemetry = false;
        self.sleep = None;
    }
}

// ---------------------------------------------------------------------------
// DeviceContext
// ---------------------------------------------------------------------------

/// The shared context passed to every state handler function.
#[derive(Debug, Clone)]
pub struct DeviceContext {
    /// Clock reading for the current tick.
    pub now_ms: u64,

    // -- Configuration --
    pub settings: DeviceSettings,
    /// Last accepted handshake.
    pub config: DeviceConfig,
    /// A handshake has been applied this wake cycle.
    pub config_received: bool,

    // -- Inputs --
    pub battery: BatteryState,
    /// A telemetry frame carrying the hard cutoff has gone out.
    pub hard_cutoff_reported: bool,
    pub acks: AckLedger,

    // -- Cycle bookkeeping --
    /// Stay-awake telemetry mode.  Set from each handshake, then replaced
    /// by the upload-mode command; the handshake config keeps what the
    /// server sent.
    pub upload_mode: bool,
    pub pump: PumpState,
    pub session: SessionClock,

    // -- Outputs --
    pub commands: Commands,
}

impl DeviceContext {
    pub fn new(settings: DeviceSettings) -> Self {
        Self {
            now_ms: 0,
            settings,
            config: DeviceConfig::default(),
            config_received: false,
            battery: BatteryState::default(),
            hard_cutoff_reported: false,
            acks: AckLedger::new(),
            upload_mode: false,
            pump: PumpState::default(),
            session: SessionClock::default(),
            commands: Commands::default(),
        }
    }

    /// Pump may run: requested and the battery allows it.
    pub fn pump_permitted(&self) -> bool {
        self.pump.activation_intent && !self.battery.pump_cutoff
    }

    /// Milliseconds the relay has been on (0 when off).
    pub fn pump_on_elapsed_ms(&self) -> u64 {
        if self.pump.powered {
            self.now_ms.saturating_sub(self.pump.on_since)
        } else {
            0
        }
    }

    /// Forget the previous cycle entirely.  The settings survive.
    pub fn reset_cycle(&mut self) {
        *self = Self::new(self.settings.clone());
    }
}
