//! GPIO / peripheral pin assignments for the solar station board.
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers.
//!
//! The board is an ESP32 DevKit with the pump relay module and the battery
//! divider wired where the ESP8266 build had them on D1 and A0.

// ---------------------------------------------------------------------------
// Water pump relay
// ---------------------------------------------------------------------------

/// Digital output driving the pump relay module.  HIGH = pump on.
pub const PUMP_RELAY_GPIO: i32 = 5;

// ---------------------------------------------------------------------------
// Status LED
// ---------------------------------------------------------------------------

/// On-board LED, wired active-low (LOW = lit).
pub const STATUS_LED_GPIO: i32 = 2;
/// LED sink polarity.
pub const STATUS_LED_ACTIVE_LOW: bool = true;

// ---------------------------------------------------------------------------
// Battery sense (ADC1)
// ---------------------------------------------------------------------------

/// Battery voltage divider.  ADC1 channel 6 (GPIO 34, input only).
pub const BATTERY_ADC_GPIO: i32 = 34;
/// ADC1 channel number for [`BATTERY_ADC_GPIO`].
pub const BATTERY_ADC_CHANNEL: u32 = 6;
/// Native converter resolution.
pub const BATTERY_ADC_BITS: u32 = 12;
/// Resolution the cutoff thresholds are expressed in.
pub const BATTERY_LEVEL_BITS: u32 = 10;

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// CPU frequency set in sdkconfig, reported in telemetry.
pub const CPU_FREQ_MHZ: u16 = 160;
