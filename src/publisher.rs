//! Acknowledged publisher.
//!
//! The MQTT client only publishes at QoS 0.  Reliability is rebuilt one
//! level up: the device keeps sending a message on every tick (no faster
//! than the resend interval) until the server answers on the ack channel
//! with the token for that message kind.
//!
//! ```text
//!  tick ──▶ try_send(kind) ──▶ publish (QoS 0) ──▶ server
//!                                                   │
//!  on_ack(token) ◀── stat/solarstation/ACK ◀────────┘
//! ```
//!
//! All kinds share one attempt counter.  It is never an error to run out:
//! the shutdown guard watches the counter and ends the cycle.

use log::{debug, info, warn};

use crate::app::ports::PublishPort;
use crate::protocol;

// ───────────────────────────────────────────────────────────────
// Message kinds
// ───────────────────────────────────────────────────────────────

/// Every message that waits for an acknowledgment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AckKind {
    OnState = 0,
    OffState = 1,
    PumpOn = 2,
    PumpOff = 3,
    PumpActiveOff = 4,
    SensorState = 5,
}

impl AckKind {
    pub const COUNT: usize = 6;

    pub const ALL: [AckKind; AckKind::COUNT] = [
        Self::OnState,
        Self::OffState,
        Self::PumpOn,
        Self::PumpOff,
        Self::PumpActiveOff,
        Self::SensorState,
    ];

    /// Token the server echoes on the ack channel.
    pub fn token(self) -> &'static str {
        match self {
            Self::OnState => "sendOnState",
            Self::OffState => "sendOffState",
            Self::PumpOn => "sendWaterPumpPowerStateOn",
            Self::PumpOff => "sendWaterPumpPowerStateOff",
            Self::PumpActiveOff => "sendWaterPumpActiveStateOff",
            Self::SensorState => "sendSensorState",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.token() == token)
    }

    /// Channel the message is published on.
    pub fn topic(self) -> &'static str {
        match self {
            Self::OnState | Self::OffState => protocol::POWER_TOPIC,
            Self::PumpOn | Self::PumpOff => protocol::PUMP_POWER_TOPIC,
            Self::PumpActiveOff => protocol::PUMP_ACTIVE_STAT_TOPIC,
            Self::SensorState => protocol::STATE_TOPIC,
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Ledger
// ───────────────────────────────────────────────────────────────

/// Delivery state of one message kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingAck {
    pub acknowledged: bool,
    /// `None` until the first send (or the first handshake timer reset).
    pub last_sent_at: Option<u64>,
}

/// Per-kind delivery state plus the shared attempt counter.
#[derive(Debug, Clone, Default)]
pub struct AckLedger {
    entries: [PendingAck; AckKind::COUNT],
    attempts: i32,
}

impl AckLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(&self, kind: AckKind) -> &PendingAck {
        &self.entries[kind as usize]
    }

    pub fn is_acked(&self, kind: AckKind) -> bool {
        self.entries[kind as usize].acknowledged
    }

    /// Mark `kind` delivered.  Returns `true` on the first ack only;
    /// acknowledgments never revert within a cycle.
    pub fn acknowledge(&mut self, kind: AckKind) -> bool {
        let entry = &mut self.entries[kind as usize];
        let fresh = !entry.acknowledged;
        entry.acknowledged = true;
        fresh
    }

    /// Restart every resend window at `now`.
    pub fn reset_timers(&mut self, now_ms: u64) {
        for e in &mut self.entries {
            e.last_sent_at = Some(now_ms);
        }
    }

    /// Clear all acknowledgments except the startup announcement, which
    /// gates the handshake itself.
    pub fn reset_for_handshake(&mut self) {
        for kind in AckKind::ALL {
            if kind != AckKind::OnState {
                self.entries[kind as usize].acknowledged = false;
            }
        }
    }

    /// Forget everything: used when a new wake cycle begins.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Shared attempt counter.  Negative right after a handshake credit.
    pub fn attempts(&self) -> i32 {
        self.attempts
    }

    /// Attempts left before the shutdown guard fires.
    pub fn attempts_remaining(&self, ceiling: i32) -> i32 {
        ceiling - self.attempts
    }

    /// Pre-decrement the counter so the sends the cycle is expected to
    /// need do not eat into the retry budget.
    pub fn apply_credit(&mut self, credit: i32) {
        self.attempts -= credit;
    }

    pub(crate) fn record_attempt(&mut self) -> i32 {
        self.attempts += 1;
        self.attempts
    }

    fn window_open(&self, kind: AckKind, now_ms: u64, interval_ms: u64) -> bool {
        match self.entries[kind as usize].last_sent_at {
            None => true,
            Some(last) => now_ms > last.saturating_add(interval_ms),
        }
    }

    fn mark_sent(&mut self, kind: AckKind, now_ms: u64) {
        self.entries[kind as usize].last_sent_at = Some(now_ms);
    }
}

// ───────────────────────────────────────────────────────────────
// Publisher
// ───────────────────────────────────────────────────────────────

/// What a [`AckPublisher::try_send`] call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Handed to the transport; `attempt` is the counter after this send.
    Sent { attempt: i32 },
    /// Resend window still closed; nothing happened.
    Suppressed,
    /// Transport refused the message.  The attempt still counts.
    TransportError { attempt: i32 },
}

/// Rate-limited publish that waits for an out-of-band acknowledgment.
#[derive(Debug, Clone, Copy)]
pub struct AckPublisher {
    resend_interval_ms: u64,
}

impl AckPublisher {
    pub fn new(resend_interval_ms: u32) -> Self {
        Self {
            resend_interval_ms: resend_interval_ms as u64,
        }
    }

    /// Publish `kind` unless its resend window is still closed.
    ///
    /// `payload` receives the attempt counter after increment and is only
    /// evaluated when the send goes ahead.  This never marks the message
    /// acknowledged; only [`AckLedger::acknowledge`] does.
    pub fn try_send(
        &self,
        ledger: &mut AckLedger,
        kind: AckKind,
        now_ms: u64,
        link: &mut impl PublishPort,
        payload: impl FnOnce(i32) -> Vec<u8>,
    ) -> SendOutcome {
        if !ledger.window_open(kind, now_ms, self.resend_interval_ms) {
            return SendOutcome::Suppressed;
        }
        ledger.mark_sent(kind, now_ms);
        let attempt = ledger.record_attempt();
        let body = payload(attempt);

        match link.publish(kind.topic(), &body) {
            Ok(()) => {
                info!("SEND {:?} -> {} (attempt {})", kind, kind.topic(), attempt);
                SendOutcome::Sent { attempt }
            }
            Err(e) => {
                warn!("SEND {:?} failed: {} (attempt {})", kind, e, attempt);
                SendOutcome::TransportError { attempt }
            }
        }
    }

    /// Publish without ack bookkeeping (periodic telemetry).
    pub fn publish_unacked(&self, topic: &str, payload: &[u8], link: &mut impl PublishPort) {
        if let Err(e) = link.publish(topic, payload) {
            debug!("unacked publish to {} dropped: {}", topic, e);
        }
    }
}
