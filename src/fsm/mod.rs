//! Function-pointer finite state machine engine for the pump cycle.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  StateTable                                                      │
//! │  ┌───────────────────────┬──────────┬─────────┬───────────────┐  │
//! │  │ StateId               │ on_enter │ on_exit │ on_update     │  │
//! │  ├───────────────────────┼──────────┼─────────┼───────────────┤  │
//! │  │ Idle                  │ fn(ctx)  │         │ fn -> Option  │  │
//! │  │ AwaitingTelemetryAck  │ fn(ctx)  │         │ fn -> Option  │  │
//! │  │ Activating            │ fn(ctx)  │         │ fn -> Option  │  │
//! │  │ Running               │ fn(ctx)  │ fn(ctx) │ fn -> Option  │  │
//! │  │ Deactivating          │ fn(ctx)  │         │ fn -> Option  │  │
//! │  │ ConfirmingDeactivated │ fn(ctx)  │         │ fn -> Option  │  │
//! │  │ Inactive              │ fn(ctx)  │         │ fn -> Option  │  │
//! │  │ Done                  │ fn(ctx)  │         │ fn -> Option  │  │
//! │  └───────────────────────┴──────────┴─────────┴───────────────┘  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each tick the engine calls `on_update` for the **current** state.
//! If it returns `Some(next_id)`, the engine runs `on_exit` for the
//! current state, then `on_enter` for the next, and updates the
//! current pointer.  Handlers never touch hardware: they write
//! [`Commands`](context::Commands) that the controller applies.

pub mod context;
pub mod states;

use context::DeviceContext;
use log::info;

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// Every pump-cycle state.
/// Must stay in sync with the table built in [`states::build_state_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StateId {
    Idle = 0,
    AwaitingTelemetryAck = 1,
    Activating = 2,
    Running = 3,
    Deactivating = 4,
    ConfirmingDeactivated = 5,
    Inactive = 6,
    Done = 7,
}

impl StateId {
    /// Total number of states, used to size the table array.
    pub const COUNT: usize = 8;

    pub const ALL: [StateId; StateId::COUNT] = [
        Self::Idle,
        Self::AwaitingTelemetryAck,
        Self::Activating,
        Self::Running,
        Self::Deactivating,
        Self::ConfirmingDeactivated,
        Self::Inactive,
        Self::Done,
    ];

    /// Convert an index back to `StateId`.  Panics on out-of-range in
    /// debug builds; returns `Inactive` (relay off) in release.
    pub fn from_index(idx: usize) -> Self {
        match Self::ALL.get(idx) {
            Some(id) => *id,
            None => {
                debug_assert!(false, "invalid state index: {idx}");
                Self::Inactive
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// Signature for `on_enter` and `on_exit` actions.
pub type StateActionFn = fn(&mut DeviceContext);

/// Per-tick handler.  Returns `Some(next)` to trigger a transition.
pub type StateUpdateFn = fn(&mut DeviceContext) -> Option<StateId>;

// ---------------------------------------------------------------------------
// State descriptor (one row in the table)
// ---------------------------------------------------------------------------

/// Static descriptor for a single FSM state.
pub struct StateDescriptor {
    pub id: StateId,
    pub name: &'static str,
    pub on_enter: Option<StateActionFn>,
    pub on_exit: Option<StateActionFn>,
    pub on_update: StateUpdateFn,
}

// ---------------------------------------------------------------------------
// FSM engine
// ---------------------------------------------------------------------------

/// The finite state machine engine.
pub struct Fsm {
    /// Fixed-size table indexed by `StateId as usize`.
    table: [StateDescriptor; StateId::COUNT],
    current: usize,
}

impl Fsm {
    pub fn new(table: [StateDescriptor; StateId::COUNT], initial: StateId) -> Self {
        Self {
            table,
            current: initial as usize,
        }
    }

    /// Run the initial `on_enter` for the starting state.
    /// Call once after construction, before the first `tick()`.
    pub fn start(&mut self, ctx: &mut DeviceContext) {
        info!("FSM starting in state: {}", self.table[self.current].name);
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }

    /// Advance the FSM by one tick.
    ///
    /// 1. Call `on_update` for the current state.
    /// 2. If it returns `Some(next)`, execute the transition:
    ///    `on_exit(current)` → update pointer → `on_enter(next)`.
    ///
    /// Returns the previous state when a transition happened.
    pub fn tick(&mut self, ctx: &mut DeviceContext) -> Option<StateId> {
        let next = (self.table[self.current].on_update)(ctx);

        next.map(|next_id| {
            let from = self.current_state();
            self.transition(next_id, ctx);
            from
        })
    }

    /// Jump to `next` regardless of what `on_update` would return.
    /// No-op when already there.
    pub fn force_transition(&mut self, next: StateId, ctx: &mut DeviceContext) {
        if next as usize != self.current {
            self.transition(next, ctx);
        }
    }

    pub fn current_state(&self) -> StateId {
        StateId::from_index(self.current)
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn transition(&mut self, next_id: StateId, ctx: &mut DeviceContext) {
        let next_idx = next_id as usize;

        info!(
            "FSM transition: {} -> {}",
            self.table[self.current].name, self.table[next_idx].name
        );

        if let Some(exit) = self.table[self.current].on_exit {
            exit(ctx);
        }

        self.current = next_idx;

        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }
}
