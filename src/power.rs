//! Sleep / shutdown manager.
//!
//! Single entry point for ending a wake cycle.  A normal end waits for
//! the server to acknowledge the `OFF` announcement (sending it again on
//! each tick until then); a failure-driven end goes down at once.  Either
//! way the relay is released and the status LED switched off before the
//! board is put to sleep.
//!
//! ```text
//!  request_sleep(require_off_ack, hard)
//!        │
//!        ├─ off ack missing? ──▶ try_send(OffState), return (retry next tick)
//!        ▼
//!  config_received = false ─▶ pump off ─▶ LED off ─▶ settle ─▶ deep_sleep(mode)
//! ```

use core::fmt;

use log::info;

use crate::app::ports::{ActuatorPort, PowerPort, PublishPort};
use crate::fsm::context::DeviceContext;
use crate::handshake::SLEEP_FOREVER;
use crate::protocol;
use crate::publisher::{AckKind, AckPublisher};

/// Low-power mode handed to the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepMode {
    /// Wake on the RTC timer.
    Timed { duration_us: u64 },
    /// No wake source; only an external reset brings the board back.
    Indefinite,
}

impl SleepMode {
    /// Pick the mode for a request given the configured duration.
    pub fn resolve(hard: bool, duration_us: u64) -> Self {
        if hard || duration_us == SLEEP_FOREVER {
            Self::Indefinite
        } else {
            Self::Timed { duration_us }
        }
    }
}

impl fmt::Display for SleepMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timed { duration_us } => write!(f, "timed {}us", duration_us),
            Self::Indefinite => write!(f, "indefinite"),
        }
    }
}

/// Why and how a cycle should end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SleepRequest {
    /// Hold off until the `OFF` announcement is acknowledged.
    pub require_off_ack: bool,
    /// Sleep indefinitely regardless of the configured duration.
    pub hard: bool,
}

impl SleepRequest {
    /// End of a completed cycle.
    pub const fn normal() -> Self {
        Self {
            require_off_ack: true,
            hard: false,
        }
    }

    /// Failure-driven: do not wait for anything.
    pub const fn forced() -> Self {
        Self {
            require_off_ack: false,
            hard: false,
        }
    }

    /// Battery below survival level: sign off, then never wake on a timer.
    pub const fn hard_cutoff() -> Self {
        Self {
            require_off_ack: true,
            hard: true,
        }
    }
}

/// Carries out [`SleepRequest`]s.
#[derive(Debug, Clone, Copy)]
pub struct SleepManager {
    publisher: AckPublisher,
    settle_ms: u32,
}

impl SleepManager {
    pub fn new(publisher: AckPublisher, settle_ms: u32) -> Self {
        Self {
            publisher,
            settle_ms,
        }
    }

    /// Try to end the cycle.  Returns the mode entered, or `None` when the
    /// request is still waiting for the off acknowledgment.
    pub fn request_sleep<H, L>(
        &self,
        ctx: &mut DeviceContext,
        request: SleepRequest,
        hw: &mut H,
        link: &mut L,
    ) -> Option<SleepMode>
    where
        H: ActuatorPort + PowerPort,
        L: PublishPort,
    {
        if request.require_off_ack && !ctx.acks.is_acked(AckKind::OffState) {
            self.publisher.try_send(
                &mut ctx.acks,
                AckKind::OffState,
                ctx.now_ms,
                link,
                protocol::power_off_payload,
            );
            return None;
        }

        ctx.config_received = false;
        ctx.commands.pump_on = false;
        ctx.pump.powered = false;
        hw.set_pump(false);
        hw.set_status_led(false);
        hw.settle(self.settle_ms);

        let mode = SleepMode::resolve(request.hard, ctx.config.sleep_duration_us);
        info!(
            "SLEEP {} after {} attempts (off ack {})",
            mode,
            ctx.acks.attempts(),
            if ctx.acks.is_acked(AckKind::OffState) { "received" } else { "skipped" },
        );
        hw.deep_sleep(mode);
        Some(mode)
    }
}
