//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (which goes to UART / USB-CDC in production).

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Telemetry(t) => {
                info!(
                    "TELEM | battery={} | pump_cutoff={} hard_cutoff={} | remaining={}s | {}",
                    t.battery,
                    t.pump_cutoff,
                    t.hard_cutoff,
                    t.remaining_secs,
                    if t.acknowledged { "acked" } else { "periodic" },
                );
            }
            AppEvent::StateChanged { from, to } => {
                info!("STATE | {:?} -> {:?}", from, to);
            }
            AppEvent::HandshakeApplied {
                upload_mode,
                pump_requested,
                fresh,
            } => {
                info!(
                    "CONFIG | upload={} pump={} | {}",
                    upload_mode,
                    pump_requested,
                    if *fresh { "new cycle" } else { "redelivered" },
                );
            }
            AppEvent::HandshakeRejected(e) => {
                warn!("CONFIG | rejected: {}", e);
            }
            AppEvent::AckReceived(kind) => {
                info!("ACK | {}", kind.token());
            }
            AppEvent::UploadMode(on) => {
                info!("UPLOAD | {}", if *on { "ON" } else { "OFF" });
            }
            AppEvent::ForcedShutdown(cause) => {
                warn!("SHUTDOWN | {}", cause);
            }
            AppEvent::SleepEntered(mode) => {
                info!("SLEEP | {}", mode);
            }
            AppEvent::Started => {
                info!("START | waiting for handshake");
            }
        }
    }
}
