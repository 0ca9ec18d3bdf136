//! Water pump relay driver.
//!
//! The pump hangs off a single relay channel switched by one GPIO.  The
//! pin is any `embedded-hal` [`OutputPin`]: on the board an esp-idf-hal
//! `PinDriver`, in host tests a recording mock.
//!
//! ## Safety contract
//!
//! This driver is a dumb actuator.  Battery cutoffs, run duration and
//! link-loss policy live in the application core; the relay only does
//! what it is told.  A failed pin write is logged and the cached state is
//! left unchanged so the next `set` retries it.

use embedded_hal::digital::OutputPin;
use log::{info, warn};

pub struct PumpRelay<P> {
    pin: P,
    on: bool,
}

impl<P: OutputPin> PumpRelay<P> {
    /// Take the pin and drive it low.
    pub fn new(pin: P) -> Self {
        let mut relay = Self { pin, on: true };
        relay.set(false);
        relay
    }

    pub fn set(&mut self, on: bool) {
        if on == self.on {
            return;
        }
        let res = if on { self.pin.set_high() } else { self.pin.set_low() };
        match res {
            Ok(()) => {
                self.on = on;
                info!("Pump relay {}", if on { "ON" } else { "OFF" });
            }
            Err(e) => warn!("Pump relay write failed: {:?}", e),
        }
    }

    pub fn is_on(&self) -> bool {
        self.on
    }
}
