//! MQTT client adapter.
//!
//! Implements [`PublishPort`] on top of the ESP-IDF MQTT client.  All
//! publishes are QoS 0 and not retained; delivery is made reliable one
//! layer up by the acknowledgment ledger.
//!
//! The client's event loop runs on its own thread.  Inbound messages are
//! copied into a bounded [`Channel`] from there and drained by the main
//! loop, so the controller is only ever touched from one task:
//!
//! ```text
//!  mqtt-poll thread                     main loop
//!  ───────────────                      ─────────
//!  Received{topic,data} ──▶ INBOUND ──▶ drain() ──▶ controller.on_message
//!  Connected            ──▶ resubscribe flag ──▶ poll() subscribes
//!  Disconnected         ──▶ reconnect counter ──▶ link-loss policy
//! ```
//!
//! On non-espidf targets the same queue is fed by [`sim_inject`] and
//! publishes are recorded in memory.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::{debug, info, warn};

use crate::app::ports::PublishPort;
use crate::error::PublishError;
#[cfg(target_os = "espidf")]
use crate::protocol;

#[cfg(target_os = "espidf")]
use esp_idf_svc::mqtt::client::{EspMqttClient, EventPayload, MqttClientConfiguration, QoS};

// ───────────────────────────────────────────────────────────────
// Inbound queue
// ───────────────────────────────────────────────────────────────

pub const TOPIC_CAP: usize = 64;
pub const PAYLOAD_CAP: usize = 512;
const INBOUND_DEPTH: usize = 8;

/// One broker message, copied out of the client's buffers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: heapless::String<TOPIC_CAP>,
    pub payload: heapless::Vec<u8, PAYLOAD_CAP>,
}

static INBOUND: Channel<CriticalSectionRawMutex, InboundMessage, INBOUND_DEPTH> = Channel::new();

static CONNECTED: AtomicBool = AtomicBool::new(false);
static NEEDS_SUBSCRIBE: AtomicBool = AtomicBool::new(false);
static RECONNECT_ATTEMPTS: AtomicU32 = AtomicU32::new(0);

/// Queue a message for the main loop.  Oversized or overflowing messages
/// are dropped; the server repeats anything that matters.
fn enqueue(topic: &str, data: &[u8]) -> bool {
    let mut msg = InboundMessage {
        topic: heapless::String::new(),
        payload: heapless::Vec::new(),
    };
    if msg.topic.push_str(topic).is_err() || msg.payload.extend_from_slice(data).is_err() {
        warn!("MQTT: dropping oversized message on {} ({} bytes)", topic, data.len());
        return false;
    }
    if INBOUND.try_send(msg).is_err() {
        warn!("MQTT: inbound queue full, dropping message on {}", topic);
        return false;
    }
    true
}

fn on_connected() {
    CONNECTED.store(true, Ordering::Release);
    NEEDS_SUBSCRIBE.store(true, Ordering::Release);
    RECONNECT_ATTEMPTS.store(0, Ordering::Relaxed);
    info!("MQTT: connected");
}

fn on_disconnected() {
    CONNECTED.store(false, Ordering::Release);
    let n = RECONNECT_ATTEMPTS.fetch_add(1, Ordering::Relaxed) + 1;
    warn!("MQTT: disconnected (attempt {})", n);
}

// ───────────────────────────────────────────────────────────────
// Adapter
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MqttError {
    /// The ESP-IDF client could not be created (esp_err_t).
    Client(i32),
    /// The event-loop thread could not be spawned.
    Thread,
}

impl core::fmt::Display for MqttError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Client(rc) => write!(f, "MQTT client init failed (rc={})", rc),
            Self::Thread => write!(f, "MQTT event thread spawn failed"),
        }
    }
}

impl std::error::Error for MqttError {}

pub struct MqttAdapter {
    #[cfg(target_os = "espidf")]
    client: EspMqttClient<'static>,
    #[cfg(not(target_os = "espidf"))]
    published: Vec<(String, Vec<u8>)>,
}

impl MqttAdapter {
    /// Create the client and start its event thread.  The connection is
    /// made in the background; [`poll`](Self::poll) subscribes once it is up.
    #[cfg(target_os = "espidf")]
    pub fn connect(url: &str, client_id: &str) -> Result<Self, MqttError> {
        let conf = MqttClientConfiguration {
            client_id: Some(client_id),
            reconnect_timeout: Some(core::time::Duration::from_secs(1)),
            ..Default::default()
        };
        let (client, mut conn) =
            EspMqttClient::new(url, &conf).map_err(|e| MqttError::Client(e.code()))?;

        std::thread::Builder::new()
            .name("mqtt-poll".to_string())
            .stack_size(8192)
            .spawn(move || {
                while let Ok(event) = conn.next() {
                    match event.payload() {
                        EventPayload::Connected(_) => on_connected(),
                        EventPayload::Disconnected => on_disconnected(),
                        EventPayload::Received { topic, data, .. } => {
                            if let Some(topic) = topic {
                                enqueue(topic, data);
                            }
                        }
                        EventPayload::Error(e) => warn!("MQTT: client error {:?}", e),
                        other => debug!("MQTT: {:?}", other),
                    }
                }
                warn!("MQTT: event loop ended");
            })
            .map_err(|_| MqttError::Thread)?;

        info!("MQTT: client started for {}", url);
        Ok(Self { client })
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn connect(url: &str, client_id: &str) -> Result<Self, MqttError> {
        info!("MQTT(sim): {} as {}", url, client_id);
        on_connected();
        Ok(Self {
            published: Vec::new(),
        })
    }

    /// Main-loop housekeeping: (re)subscribe after a connect.
    pub fn poll(&mut self) {
        if NEEDS_SUBSCRIBE.swap(false, Ordering::AcqRel) {
            self.subscribe_all();
        }
    }

    #[cfg(target_os = "espidf")]
    fn subscribe_all(&mut self) {
        for (topic, qos) in protocol::SUBSCRIPTIONS {
            let qos = if qos == 0 { QoS::AtMostOnce } else { QoS::AtLeastOnce };
            match self.client.subscribe(topic, qos) {
                Ok(_) => info!("MQTT: subscribed {} ({:?})", topic, qos),
                Err(e) => {
                    warn!("MQTT: subscribe {} failed: {}", topic, e);
                    NEEDS_SUBSCRIBE.store(true, Ordering::Release);
                }
            }
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn subscribe_all(&mut self) {
        debug!("MQTT(sim): subscriptions implied");
    }

    /// Hand every queued inbound message to `f`, oldest first.
    pub fn drain(&mut self, mut f: impl FnMut(&InboundMessage)) {
        while let Ok(msg) = INBOUND.try_receive() {
            f(&msg);
        }
    }

    pub fn is_connected(&self) -> bool {
        CONNECTED.load(Ordering::Acquire)
    }

    /// Failed connects since the session was last up.
    pub fn reconnect_attempts(&self) -> u32 {
        RECONNECT_ATTEMPTS.load(Ordering::Relaxed)
    }

    /// Simulation: everything published so far.
    #[cfg(not(target_os = "espidf"))]
    pub fn published(&self) -> &[(String, Vec<u8>)] {
        &self.published
    }
}

impl PublishPort for MqttAdapter {
    #[cfg(target_os = "espidf")]
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), PublishError> {
        if !self.is_connected() {
            return Err(PublishError::Disconnected);
        }
        self.client
            .enqueue(topic, QoS::AtMostOnce, false, payload)
            .map(|_| ())
            .map_err(|e| {
                warn!("MQTT: publish to {} refused: {}", topic, e);
                PublishError::Rejected
            })
    }

    #[cfg(not(target_os = "espidf"))]
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), PublishError> {
        if !self.is_connected() {
            return Err(PublishError::Disconnected);
        }
        self.published.push((topic.to_string(), payload.to_vec()));
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// Simulation hooks
// ───────────────────────────────────────────────────────────────

/// Simulation: deliver a message as if the broker had sent it.
#[cfg(not(target_os = "espidf"))]
pub fn sim_inject(topic: &str, payload: &[u8]) -> bool {
    enqueue(topic, payload)
}

/// Simulation: drop or restore the broker session.
#[cfg(not(target_os = "espidf"))]
pub fn sim_set_connected(up: bool) {
    if up {
        on_connected();
    } else {
        on_disconnected();
    }
}
