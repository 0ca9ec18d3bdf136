//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ DeviceController (domain)
//! ```
//!
//! Driven adapters (ADC, relay, deep sleep, MQTT client, event sinks)
//! implement these traits.  The [`DeviceController`](super::service::DeviceController)
//! consumes them via generics, so the domain core never touches hardware
//! or the network directly.

use crate::error::PublishError;
use crate::power::SleepMode;

// ───────────────────────────────────────────────────────────────
// Board-side ports (driven adapter: hardware ↔ domain)
// ───────────────────────────────────────────────────────────────

/// Monotonic millisecond clock.
pub trait ClockPort {
    fn now_ms(&self) -> u64;
}

/// Raw analog read of the battery divider.
pub trait BatteryPort {
    fn read_battery_raw(&mut self) -> u16;
}

/// Digital outputs the controller drives.
pub trait ActuatorPort {
    /// Energise (`true`) or release (`false`) the pump relay.
    fn set_pump(&mut self, on: bool);

    /// Built-in status LED; lit while the device stays awake for uploads.
    fn set_status_led(&mut self, on: bool);
}

/// Low-power transitions.
pub trait PowerPort {
    /// Short blocking delay before sleeping, so queued publishes drain.
    fn settle(&mut self, ms: u32);

    /// Enter low-power mode.  On hardware this does not return; the next
    /// wake is a reset.  Host adapters return so tests can observe it.
    fn deep_sleep(&mut self, mode: SleepMode);
}

/// Identity and link facts reported in telemetry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: heapless::String<32>,
    pub ip: heapless::String<16>,
    pub mac: heapless::String<18>,
    /// Signal quality 0–100 %.
    pub wifi_quality: u8,
    pub cpu_mhz: u16,
}

pub trait DeviceInfoPort {
    fn device_info(&self) -> DeviceInfo;
}

/// Everything the controller needs from the board in one bound.
pub trait BoardPort: ClockPort + BatteryPort + ActuatorPort + PowerPort + DeviceInfoPort {}

impl<T> BoardPort for T where T: ClockPort + BatteryPort + ActuatorPort + PowerPort + DeviceInfoPort {}

// ───────────────────────────────────────────────────────────────
// Transport port (driven adapter: domain → broker)
// ───────────────────────────────────────────────────────────────

/// Fire-and-forget publish.  No delivery guarantee: reliability is layered
/// on top by [`AckPublisher`](crate::publisher::AckPublisher).
pub trait PublishPort {
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), PublishError>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}
