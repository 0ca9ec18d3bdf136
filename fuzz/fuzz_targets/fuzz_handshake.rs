//! Fuzz target: `handshake::apply`
//!
//! Feeds arbitrary bytes as a handshake payload, once into a fresh context
//! and once into a context that already holds a configuration.
//!
//! Invariants checked:
//! - No panics under any byte sequence
//! - A rejected payload leaves the configuration, timers and retry budget
//!   exactly as they were
//! - An accepted payload always marks the configuration received and never
//!   yields a pump duration or sleep time outside what the parser can produce
//!
//! cargo fuzz run fuzz_handshake

#![no_main]

use libfuzzer_sys::fuzz_target;
use solarstation::battery::BatteryState;
use solarstation::config::DeviceSettings;
use solarstation::fsm::context::DeviceContext;
use solarstation::handshake;

const KNOWN_GOOD: &[u8] = br#"{"time":"06:00","upload_mode":"OFF","pump_active":"ON","pump_seconds":"5","esp_sleep_time_minutes":"10"}"#;

fn healthy() -> BatteryState {
    BatteryState {
        raw_level: 1000,
        pump_cutoff: false,
        hard_cutoff: false,
    }
}

fn check(ctx: &mut DeviceContext, data: &[u8]) {
    let config = ctx.config.clone();
    let received = ctx.config_received;
    let attempts = ctx.acks.attempts();
    let session = ctx.session;

    match handshake::apply(ctx, data, 5_000, healthy) {
        Ok(applied) => {
            assert!(ctx.config_received);
            assert_eq!(ctx.config, applied);
            assert_eq!(ctx.session.handshake_at, 5_000);
            assert!(
                applied.sleeps_forever() || applied.sleep_duration_us >= 1_000_000,
                "timed sleep shorter than one second"
            );
        }
        Err(_) => {
            assert_eq!(ctx.config, config, "rejected payload changed the config");
            assert_eq!(ctx.config_received, received);
            assert_eq!(ctx.acks.attempts(), attempts);
            assert_eq!(ctx.session, session);
        }
    }
}

fuzz_target!(|data: &[u8]| {
    let mut fresh = DeviceContext::new(DeviceSettings::default());
    check(&mut fresh, data);

    let mut configured = DeviceContext::new(DeviceSettings::default());
    if handshake::apply(&mut configured, KNOWN_GOOD, 100, healthy).is_ok() {
        check(&mut configured, data);
    }
});
