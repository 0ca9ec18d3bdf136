//! Safety supervisor.
//!
//! Two independent breakers that end a wake cycle without waiting for the
//! server:
//!
//! * [`ShutdownGuard`] runs **every tick after the protocol branch** and
//!   fires when the session has run too long since the last handshake or
//!   the shared publish-attempt counter reaches its ceiling.  It reads no
//!   acknowledgment state, so a server that never answers cannot keep the
//!   pump powered or the radio on.
//! * [`LinkPolicy`] is consulted by the network adapters while they are
//!   reconnecting.  After a few failed attempts the relay is released;
//!   after many the device gives up and sleeps.
//!
//! Both report a [`ShutdownCause`]; the controller turns that into pin-off
//! plus an unconditional sleep.

use crate::config::DeviceSettings;
use crate::error::ShutdownCause;
use crate::fsm::context::DeviceContext;
use log::{error, warn};

// ---------------------------------------------------------------------------
// Forced-shutdown guard
// ---------------------------------------------------------------------------

/// Session-time and retry-budget breaker.
#[derive(Debug, Clone, Copy)]
pub struct ShutdownGuard {
    force_sleep_after_ms: u64,
    max_attempts: i32,
}

impl ShutdownGuard {
    pub fn new(settings: &DeviceSettings) -> Self {
        Self {
            force_sleep_after_ms: settings.force_sleep_after_ms as u64,
            max_attempts: settings.max_publish_attempts,
        }
    }

    /// Check both ceilings against the context.
    pub fn evaluate(&self, ctx: &DeviceContext) -> Option<ShutdownCause> {
        let elapsed = ctx.now_ms.saturating_sub(ctx.session.handshake_at);
        if elapsed > self.force_sleep_after_ms {
            error!(
                "SAFETY: {}ms since last handshake exceeds {}ms",
                elapsed, self.force_sleep_after_ms
            );
            return Some(ShutdownCause::SessionTimeout);
        }
        if ctx.acks.attempts() >= self.max_attempts {
            error!(
                "SAFETY: {} publish attempts reached ceiling {}",
                ctx.acks.attempts(),
                self.max_attempts
            );
            return Some(ShutdownCause::RetryBudgetExhausted);
        }
        None
    }
}

// ---------------------------------------------------------------------------
// Link-loss policy
// ---------------------------------------------------------------------------

/// What to do about a link that keeps failing to reconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkAction {
    None,
    /// Release the relay; keep trying.
    PumpOff,
    /// Give up on this cycle.
    Shutdown,
}

#[derive(Debug, Clone, Copy)]
pub struct LinkPolicy {
    pump_off_after: u32,
    shutdown_after: u32,
}

impl LinkPolicy {
    pub fn new(settings: &DeviceSettings) -> Self {
        Self {
            pump_off_after: settings.link_pump_off_attempts,
            shutdown_after: settings.link_shutdown_attempts,
        }
    }

    /// Decide from the WiFi and broker reconnect counters.
    pub fn evaluate(&self, wifi_attempts: u32, mqtt_attempts: u32) -> LinkAction {
        if wifi_attempts > self.shutdown_after || mqtt_attempts > self.shutdown_after {
            error!(
                "LINK: giving up (wifi={}, mqtt={} attempts)",
                wifi_attempts, mqtt_attempts
            );
            LinkAction::Shutdown
        } else if wifi_attempts > self.pump_off_after || mqtt_attempts > self.pump_off_after {
            warn!(
                "LINK: releasing pump (wifi={}, mqtt={} attempts)",
                wifi_attempts, mqtt_attempts
            );
            LinkAction::PumpOff
        } else {
            LinkAction::None
        }
    }
}
