//! Device controller: the hexagonal core.
//!
//! [`DeviceController`] owns the pump FSM, the shared context, the
//! acknowledged publisher and the two breakers.  It exposes a
//! hardware-agnostic API; all I/O flows through port traits injected at
//! call sites, so the whole wake cycle runs against mock adapters.
//!
//! ```text
//!  BoardPort ───▶ ┌──────────────────────────────┐ ──▶ EventSink
//!                 │       DeviceController        │
//!  on_message ──▶ │ Handshake · FSM · Publisher  │ ──▶ PublishPort
//!                 │ ShutdownGuard · SleepManager │
//!                 └──────────────────────────────┘
//! ```
//!
//! One [`tick`](DeviceController::tick) does, in order:
//!
//! 1. announce `ON` until it is acknowledged and a handshake has arrived;
//! 2. otherwise run upload mode (LED on, pump off, periodic telemetry) or
//!    the pump FSM and carry out its requests;
//! 3. evaluate the shutdown guard last, so it overrides everything above.

use log::{info, warn};

use crate::battery::{BatteryMonitor, BatteryState};
use crate::config::DeviceSettings;
use crate::error::{ParseError, Result, ShutdownCause};
use crate::fsm::context::DeviceContext;
use crate::fsm::states::build_state_table;
use crate::fsm::{Fsm, StateId};
use crate::handshake::{self, DeviceConfig};
use crate::power::{SleepManager, SleepMode, SleepRequest};
use crate::protocol;
use crate::publisher::{AckKind, AckPublisher};
use crate::safety::{LinkAction, LinkPolicy, ShutdownGuard};
use crate::telemetry::Telemetry;

use super::commands::AppCommand;
use super::events::{AppEvent, TelemetrySummary};
use super::ports::{BoardPort, EventSink, PublishPort};

// ───────────────────────────────────────────────────────────────
// DeviceController
// ───────────────────────────────────────────────────────────────

/// Orchestrates one wake cycle of the solar station.
pub struct DeviceController {
    fsm: Fsm,
    ctx: DeviceContext,
    monitor: BatteryMonitor,
    publisher: AckPublisher,
    sleeper: SleepManager,
    guard: ShutdownGuard,
    link_policy: LinkPolicy,
    /// Set once the board has been told to sleep; the cycle is over.
    asleep: Option<SleepMode>,
}

impl DeviceController {
    /// Construct the controller.  Does **not** touch hardware; call
    /// [`start`](Self::start) next.
    pub fn new(settings: DeviceSettings) -> Result<Self> {
        settings.validate()?;
        let publisher = AckPublisher::new(settings.resend_interval_ms);
        Ok(Self {
            fsm: Fsm::new(build_state_table(), StateId::Idle),
            monitor: BatteryMonitor::new(&settings),
            publisher,
            sleeper: SleepManager::new(publisher, settings.sleep_settle_ms),
            guard: ShutdownGuard::new(&settings),
            link_policy: LinkPolicy::new(&settings),
            ctx: DeviceContext::new(settings),
            asleep: None,
        })
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Begin the wake cycle: relay off, LED off, session clock started.
    pub fn start(&mut self, hw: &mut impl BoardPort, sink: &mut impl EventSink) {
        let now = hw.now_ms();
        self.ctx.now_ms = now;
        self.ctx.session.reset(now);
        hw.set_pump(false);
        hw.set_status_led(false);
        self.ctx.battery = self.monitor.sample(hw);
        self.fsm.start(&mut self.ctx);
        info!(
            "DeviceController started (battery {}, waiting for handshake)",
            self.ctx.battery.raw_level
        );
        sink.emit(&AppEvent::Started);
    }

    /// Begin a fresh cycle after a sleep.  On the board the wake is a
    /// reset and this is never called; host builds use it to replay the
    /// reboot.
    pub fn wake(&mut self, hw: &mut impl BoardPort, sink: &mut impl EventSink) {
        self.ctx.reset_cycle();
        self.fsm = Fsm::new(build_state_table(), StateId::Idle);
        self.asleep = None;
        self.start(hw, sink);
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one non-blocking control tick.
    pub fn tick(
        &mut self,
        hw: &mut impl BoardPort,
        link: &mut impl PublishPort,
        sink: &mut impl EventSink,
    ) {
        if self.asleep.is_some() {
            return;
        }
        self.ctx.now_ms = hw.now_ms();
        self.ctx.commands.clear_requests();

        if !self.ctx.acks.is_acked(AckKind::OnState) || !self.ctx.config_received {
            self.send_reliable(AckKind::OnState, hw, link, sink);
        } else if self.ctx.upload_mode {
            self.upload_tick(hw, link, sink);
        } else {
            self.pump_tick(hw, link, sink);
        }

        if self.asleep.is_none() {
            if let Some(cause) = self.guard.evaluate(&self.ctx) {
                self.force_shutdown(cause, hw, link, sink);
            }
        }
    }

    // ── Inbound messages ──────────────────────────────────────

    /// Handle one broker message.  A rejected payload leaves all state
    /// as it was and is reported both as an event and as the error.
    pub fn on_message(
        &mut self,
        topic: &str,
        payload: &[u8],
        hw: &mut impl BoardPort,
        sink: &mut impl EventSink,
    ) -> core::result::Result<(), ParseError> {
        if self.asleep.is_some() {
            return Ok(());
        }
        self.ctx.now_ms = hw.now_ms();

        let command = match AppCommand::parse(topic, payload) {
            Ok(Some(command)) => command,
            Ok(None) => return Ok(()),
            Err(e) => {
                warn!("Rejected message on {}: {}", topic, e);
                sink.emit(&AppEvent::HandshakeRejected(e));
                return Err(e);
            }
        };

        match command {
            AppCommand::Configure(raw) => {
                let fresh = !self.ctx.config_received;
                let monitor = self.monitor;
                let now = self.ctx.now_ms;
                match handshake::apply(&mut self.ctx, raw, now, || monitor.sample(hw)) {
                    Ok(config) => sink.emit(&AppEvent::HandshakeApplied {
                        upload_mode: config.upload_mode,
                        pump_requested: config.pump_activation_requested,
                        fresh,
                    }),
                    Err(e) => {
                        sink.emit(&AppEvent::HandshakeRejected(e));
                        return Err(e);
                    }
                }
            }
            AppCommand::Ack(kind) => {
                if self.ctx.acks.acknowledge(kind) {
                    info!("ACK {:?} ({})", kind, kind.token());
                    sink.emit(&AppEvent::AckReceived(kind));
                }
            }
            AppCommand::UploadMode(on) => {
                if self.ctx.upload_mode != on {
                    info!("Upload mode {}", if on { "ON" } else { "OFF" });
                }
                self.ctx.upload_mode = on;
                sink.emit(&AppEvent::UploadMode(on));
            }
            AppCommand::PumpActive(on) => {
                info!("Pump activation {}", if on { "requested" } else { "cancelled" });
                self.ctx.pump.activation_intent = on;
            }
        }
        Ok(())
    }

    /// Called by the network adapters while they keep failing to
    /// reconnect.  Returns what the policy decided.
    pub fn on_link_lost(
        &mut self,
        wifi_attempts: u32,
        mqtt_attempts: u32,
        hw: &mut impl BoardPort,
        link: &mut impl PublishPort,
        sink: &mut impl EventSink,
    ) -> LinkAction {
        if self.asleep.is_some() {
            return LinkAction::None;
        }
        self.ctx.now_ms = hw.now_ms();
        let action = self.link_policy.evaluate(wifi_attempts, mqtt_attempts);
        match action {
            LinkAction::None => {}
            LinkAction::PumpOff => {
                if self.fsm.current_state() == StateId::Running {
                    self.transition(StateId::Deactivating, sink);
                }
                self.ctx.commands.pump_on = false;
                self.ctx.pump.powered = false;
                hw.set_pump(false);
            }
            LinkAction::Shutdown => self.force_shutdown(ShutdownCause::LinkLost, hw, link, sink),
        }
        action
    }

    // ── Queries ───────────────────────────────────────────────

    /// Current pump FSM state.
    pub fn state(&self) -> StateId {
        self.fsm.current_state()
    }

    /// `Some(mode)` once the cycle has ended.
    pub fn sleep_mode(&self) -> Option<SleepMode> {
        self.asleep
    }

    pub fn is_asleep(&self) -> bool {
        self.asleep.is_some()
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.ctx.config
    }

    /// Upload mode currently in force, including command overrides.
    pub fn upload_mode(&self) -> bool {
        self.ctx.upload_mode
    }

    pub fn config_received(&self) -> bool {
        self.ctx.config_received
    }

    pub fn battery(&self) -> BatteryState {
        self.ctx.battery
    }

    /// Read-only view of the whole cycle state.
    pub fn context(&self) -> &DeviceContext {
        &self.ctx
    }

    // ── Internal ──────────────────────────────────────────────

    fn upload_tick(
        &mut self,
        hw: &mut impl BoardPort,
        link: &mut impl PublishPort,
        sink: &mut impl EventSink,
    ) {
        hw.set_status_led(true);
        // The pump FSM keeps its place; a run in progress is stopped and
        // reported once upload mode ends.
        if self.fsm.current_state() == StateId::Running {
            self.transition(StateId::Deactivating, sink);
        }
        self.ctx.commands.pump_on = false;
        self.ctx.pump.powered = false;
        hw.set_pump(false);

        let interval = self.ctx.settings.upload_telemetry_interval_ms as u64;
        if self.ctx.now_ms.saturating_sub(self.ctx.session.telemetry_at) >= interval {
            self.ctx.session.telemetry_at = self.ctx.now_ms;
            self.publish_telemetry(hw, link, sink);
        }
    }

    fn pump_tick(
        &mut self,
        hw: &mut impl BoardPort,
        link: &mut impl PublishPort,
        sink: &mut impl EventSink,
    ) {
        hw.set_status_led(false);

        if let Some(from) = self.fsm.tick(&mut self.ctx) {
            sink.emit(&AppEvent::StateChanged {
                from,
                to: self.fsm.current_state(),
            });
        }
        hw.set_pump(self.ctx.commands.pump_on);

        if let Some(kind) = self.ctx.commands.send {
            self.send_reliable(kind, hw, link, sink);
        }
        if self.ctx.commands.telemetry {
            self.publish_telemetry(hw, link, sink);
        }

        let request = if self.ctx.hard_cutoff_reported {
            Some(SleepRequest::hard_cutoff())
        } else {
            self.ctx.commands.sleep
        };
        if let Some(request) = request {
            self.enter_sleep(request, hw, link, sink);
        }
    }

    fn send_reliable(
        &mut self,
        kind: AckKind,
        hw: &mut impl BoardPort,
        link: &mut impl PublishPort,
        sink: &mut impl EventSink,
    ) {
        if kind == AckKind::SensorState {
            self.send_sensor_state(hw, link, sink);
            return;
        }
        let payload: fn(i32) -> Vec<u8> = match kind {
            AckKind::OnState => |_| protocol::power_on_payload(),
            AckKind::OffState => protocol::power_off_payload,
            AckKind::PumpOn => |_| protocol::ON_CMD.as_bytes().to_vec(),
            AckKind::PumpOff | AckKind::PumpActiveOff | AckKind::SensorState => {
                |_| protocol::OFF_CMD.as_bytes().to_vec()
            }
        };
        self.publisher
            .try_send(&mut self.ctx.acks, kind, self.ctx.now_ms, link, payload);
    }

    /// Acknowledged telemetry.  The battery is only re-sampled when the
    /// resend window lets the frame go out.
    fn send_sensor_state(
        &mut self,
        hw: &mut impl BoardPort,
        link: &mut impl PublishPort,
        sink: &mut impl EventSink,
    ) {
        let info = hw.device_info();
        let monitor = self.monitor;
        let previous = self.ctx.battery;
        let remaining = self.ctx.pump.remaining_secs;
        let config = &self.ctx.config;
        let mut sampled = None;

        self.publisher.try_send(
            &mut self.ctx.acks,
            AckKind::SensorState,
            self.ctx.now_ms,
            link,
            |_| {
                let battery = previous.latch(monitor.sample(hw));
                sampled = Some(battery);
                Telemetry::new(&info, config, battery, remaining).to_vec()
            },
        );

        if let Some(battery) = sampled {
            self.ctx.battery = battery;
            self.after_telemetry(true, sink);
        }
    }

    /// Unacknowledged periodic telemetry.
    fn publish_telemetry(
        &mut self,
        hw: &mut impl BoardPort,
        link: &mut impl PublishPort,
        sink: &mut impl EventSink,
    ) {
        self.ctx.battery = self.ctx.battery.latch(self.monitor.sample(hw));
        let info = hw.device_info();
        let frame = Telemetry::new(
            &info,
            &self.ctx.config,
            self.ctx.battery,
            self.ctx.pump.remaining_secs,
        )
        .to_vec();
        self.publisher
            .publish_unacked(protocol::STATE_TOPIC, &frame, link);
        self.after_telemetry(false, sink);
    }

    fn after_telemetry(&mut self, acknowledged: bool, sink: &mut impl EventSink) {
        let battery = self.ctx.battery;
        sink.emit(&AppEvent::Telemetry(TelemetrySummary {
            battery: battery.raw_level,
            pump_cutoff: battery.pump_cutoff,
            hard_cutoff: battery.hard_cutoff,
            remaining_secs: self.ctx.pump.remaining_secs,
            acknowledged,
        }));
        if battery.hard_cutoff && !self.ctx.upload_mode && !self.ctx.hard_cutoff_reported {
            warn!(
                "Battery {} below survival level: reporting and sleeping indefinitely",
                battery.raw_level
            );
            self.ctx.hard_cutoff_reported = true;
        }
    }

    fn force_shutdown(
        &mut self,
        cause: ShutdownCause,
        hw: &mut impl BoardPort,
        link: &mut impl PublishPort,
        sink: &mut impl EventSink,
    ) {
        warn!("Forced shutdown: {}", cause);
        sink.emit(&AppEvent::ForcedShutdown(cause));
        self.ctx.commands.pump_on = false;
        self.ctx.pump.powered = false;
        hw.set_pump(false);
        self.enter_sleep(SleepRequest::forced(), hw, link, sink);
    }

    fn enter_sleep(
        &mut self,
        request: SleepRequest,
        hw: &mut impl BoardPort,
        link: &mut impl PublishPort,
        sink: &mut impl EventSink,
    ) {
        if self.asleep.is_some() {
            return;
        }
        if let Some(mode) = self.sleeper.request_sleep(&mut self.ctx, request, hw, link) {
            self.asleep = Some(mode);
            sink.emit(&AppEvent::SleepEntered(mode));
        }
    }

    fn transition(&mut self, to: StateId, sink: &mut impl EventSink) {
        let from = self.fsm.current_state();
        if from != to {
            self.fsm.force_transition(to, &mut self.ctx);
            sink.emit(&AppEvent::StateChanged { from, to });
        }
    }
}
