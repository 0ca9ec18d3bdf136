//! Single-colour status LED.
//!
//! Lit while the station stays awake in upload mode.  The on-board LED
//! sinks current, so with `active_low` the pin level is inverted.

use embedded_hal::digital::{OutputPin, PinState};
use log::warn;

pub struct StatusLed<P> {
    pin: P,
    active_low: bool,
    lit: bool,
}

impl<P: OutputPin> StatusLed<P> {
    /// Take the pin and switch the LED off.
    pub fn new(pin: P, active_low: bool) -> Self {
        let mut led = Self {
            pin,
            active_low,
            lit: true,
        };
        led.set(false);
        led
    }

    pub fn set(&mut self, lit: bool) {
        if lit == self.lit {
            return;
        }
        let level = PinState::from(lit != self.active_low);
        match self.pin.set_state(level) {
            Ok(()) => self.lit = lit,
            Err(e) => warn!("Status LED write failed: {:?}", e),
        }
    }

    pub fn is_lit(&self) -> bool {
        self.lit
    }
}
