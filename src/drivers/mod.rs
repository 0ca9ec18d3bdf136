//! Actuator and sensor drivers, hardware initialisation, and the watchdog.

pub mod battery_adc;
pub mod hw_init;
pub mod pump;
pub mod status_led;
pub mod watchdog;
