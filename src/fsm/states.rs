//! Concrete state handler functions and table builder.
//!
//! Each state is defined by plain `fn` pointers: no closures, no dynamic
//! dispatch, no heap.
//!
//! ```text
//!  IDLE ──[intent && !cutoff]──▶ AWAITING_TELEMETRY_ACK ──[ack]──▶ ACTIVATING
//!   │                                                                 │
//!   │                                                          [pump-on ack]
//!   │                                                                 ▼
//!   │                         DEACTIVATING ◀──[timer | cutoff]──── RUNNING
//!   │                              │
//!   │                        [pump-off ack]
//!   │                              ▼
//!   │                   CONFIRMING_DEACTIVATED ──[active-off ack]──▶ DONE
//!   │                                                                 ▲
//!   └──[no intent | cutoff]──▶ INACTIVE ──[pump-off + telemetry acks]──┘
//!
//!  AWAITING_TELEMETRY_ACK / ACTIVATING ──[intent lost | cutoff]──▶ INACTIVE
//! ```
//!
//! The relay is commanded on in exactly one place, `running_enter`, and
//! every other state that can follow it commands it off on entry.

use super::context::DeviceContext;
use super::{StateDescriptor, StateId};
use crate::power::SleepRequest;
use crate::publisher::AckKind;
use log::{info, warn};

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the static state table.  Called once per wake cycle.
pub fn build_state_table() -> [StateDescriptor; StateId::COUNT] {
    [
        StateDescriptor {
            id: StateId::Idle,
            name: "Idle",
            on_enter: Some(idle_enter),
            on_exit: None,
            on_update: idle_update,
        },
        StateDescriptor {
            id: StateId::AwaitingTelemetryAck,
            name: "AwaitingTelemetryAck",
            on_enter: Some(awaiting_telemetry_enter),
            on_exit: None,
            on_update: awaiting_telemetry_update,
        },
        StateDescriptor {
            id: StateId::Activating,
            name: "Activating",
            on_enter: Some(activating_enter),
            on_exit: None,
            on_update: activating_update,
        },
        StateDescriptor {
            id: StateId::Running,
            name: "Running",
            on_enter: Some(running_enter),
            on_exit: Some(running_exit),
            on_update: running_update,
        },
        StateDescriptor {
            id: StateId::Deactivating,
            name: "Deactivating",
            on_enter: Some(deactivating_enter),
            on_exit: None,
            on_update: deactivating_update,
        },
        StateDescriptor {
            id: StateId::ConfirmingDeactivated,
            name: "ConfirmingDeactivated",
            on_enter: Some(confirming_enter),
            on_exit: None,
            on_update: confirming_update,
        },
        StateDescriptor {
            id: StateId::Inactive,
            name: "Inactive",
            on_enter: Some(inactive_enter),
            on_exit: None,
            on_update: inactive_update,
        },
        StateDescriptor {
            id: StateId::Done,
            name: "Done",
            on_enter: Some(done_enter),
            on_exit: None,
            on_update: done_update,
        },
    ]
}

fn pump_off(ctx: &mut DeviceContext) {
    ctx.commands.pump_on = false;
    ctx.pump.powered = false;
}

/// Request `kind` until it is acknowledged.  Returns `true` once it is.
fn deliver(ctx: &mut DeviceContext, kind: AckKind) -> bool {
    if ctx.acks.is_acked(kind) {
        return true;
    }
    ctx.commands.send = Some(kind);
    false
}

// ═══════════════════════════════════════════════════════════════════════════
//  IDLE: decide between the activation and inactive paths
// ═══════════════════════════════════════════════════════════════════════════

fn idle_enter(ctx: &mut DeviceContext) {
    pump_off(ctx);
}

fn idle_update(ctx: &mut DeviceContext) -> Option<StateId> {
    if ctx.pump_permitted() {
        info!(
            "IDLE: pump requested for {}ms, announcing telemetry first",
            ctx.config.pump_on_duration_ms
        );
        Some(StateId::AwaitingTelemetryAck)
    } else {
        if ctx.pump.activation_intent {
            warn!(
                "IDLE: pump requested but battery {} below pump-safe level",
                ctx.battery.raw_level
            );
        }
        Some(StateId::Inactive)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  AWAITING_TELEMETRY_ACK: server must see the battery before a run
// ═══════════════════════════════════════════════════════════════════════════

fn awaiting_telemetry_enter(ctx: &mut DeviceContext) {
    deliver(ctx, AckKind::SensorState);
}

fn awaiting_telemetry_update(ctx: &mut DeviceContext) -> Option<StateId> {
    if !ctx.pump_permitted() {
        return Some(StateId::Inactive);
    }
    if deliver(ctx, AckKind::SensorState) {
        return Some(StateId::Activating);
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  ACTIVATING: pump-on announced, relay still off
// ═══════════════════════════════════════════════════════════════════════════

fn activating_enter(ctx: &mut DeviceContext) {
    deliver(ctx, AckKind::PumpOn);
}

fn activating_update(ctx: &mut DeviceContext) -> Option<StateId> {
    if !ctx.pump_permitted() {
        return Some(StateId::Inactive);
    }
    if deliver(ctx, AckKind::PumpOn) {
        return Some(StateId::Running);
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  RUNNING: relay energised, safety timer armed
// ═══════════════════════════════════════════════════════════════════════════

fn running_enter(ctx: &mut DeviceContext) {
    ctx.commands.pump_on = true;
    ctx.pump.powered = true;
    ctx.pump.on_since = ctx.now_ms;
    ctx.pump.last_report_at = ctx.now_ms;
    info!(
        "RUNNING: pump on for {}ms (battery {})",
        ctx.config.pump_on_duration_ms, ctx.battery.raw_level
    );
}

fn running_exit(ctx: &mut DeviceContext) {
    let ran = ctx.pump_on_elapsed_ms();
    pump_off(ctx);
    info!("RUNNING: pump off after {}ms", ran);
}

fn running_update(ctx: &mut DeviceContext) -> Option<StateId> {
    // The timer does not depend on any acknowledgment.
    if ctx.pump_on_elapsed_ms() >= ctx.config.pump_on_duration_ms as u64 {
        return Some(StateId::Deactivating);
    }
    if !ctx.pump_permitted() {
        warn!(
            "RUNNING: stopping early (intent={}, battery={})",
            ctx.pump.activation_intent, ctx.battery.raw_level
        );
        return Some(StateId::Deactivating);
    }

    let interval = ctx.settings.pump_telemetry_interval_ms as u64;
    if ctx.now_ms.saturating_sub(ctx.pump.last_report_at) >= interval {
        ctx.pump.last_report_at = ctx.now_ms;
        ctx.pump.remaining_secs -= 1;
        ctx.commands.telemetry = true;
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  DEACTIVATING / CONFIRMING_DEACTIVATED: report the stop
// ═══════════════════════════════════════════════════════════════════════════

fn deactivating_enter(ctx: &mut DeviceContext) {
    pump_off(ctx);
    deliver(ctx, AckKind::PumpOff);
}

fn deactivating_update(ctx: &mut DeviceContext) -> Option<StateId> {
    if deliver(ctx, AckKind::PumpOff) {
        return Some(StateId::ConfirmingDeactivated);
    }
    None
}

fn confirming_enter(ctx: &mut DeviceContext) {
    deliver(ctx, AckKind::PumpActiveOff);
}

fn confirming_update(ctx: &mut DeviceContext) -> Option<StateId> {
    if deliver(ctx, AckKind::PumpActiveOff) {
        return Some(StateId::Done);
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  INACTIVE: no run this cycle; report off and battery, then sleep
// ═══════════════════════════════════════════════════════════════════════════

fn inactive_enter(ctx: &mut DeviceContext) {
    pump_off(ctx);
    info!(
        "INACTIVE: no pump run (intent={}, pump_cutoff={})",
        ctx.pump.activation_intent, ctx.battery.pump_cutoff
    );
    deliver(ctx, AckKind::PumpOff);
}

fn inactive_update(ctx: &mut DeviceContext) -> Option<StateId> {
    if ctx.pump_permitted() {
        return Some(StateId::Idle);
    }
    if !deliver(ctx, AckKind::PumpOff) {
        return None;
    }
    if deliver(ctx, AckKind::SensorState) {
        return Some(StateId::Done);
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  DONE: cycle complete, hand over to the sleep manager
// ═══════════════════════════════════════════════════════════════════════════

fn done_enter(ctx: &mut DeviceContext) {
    pump_off(ctx);
    info!(
        "DONE: cycle complete after {} attempts ({} left)",
        ctx.acks.attempts(),
        ctx.acks.attempts_remaining(ctx.settings.max_publish_attempts)
    );
    ctx.commands.sleep = Some(SleepRequest::normal());
}

fn done_update(ctx: &mut DeviceContext) -> Option<StateId> {
    ctx.commands.sleep = Some(SleepRequest::normal());
    None
}
