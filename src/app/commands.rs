//! Inbound commands to the controller.
//!
//! Every broker message is routed through [`AppCommand::parse`], which
//! maps the topic to one of the handlers of the
//! [`DeviceController`](super::service::DeviceController).  Messages on
//! topics the device does not subscribe to, and ack tokens it does not
//! know, are ignored.

use log::debug;

use crate::error::ParseError;
use crate::protocol;
use crate::publisher::AckKind;

/// Commands the broker can send into the application core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppCommand<'a> {
    /// Full handshake payload, parsed by the handshake module.
    Configure(&'a [u8]),
    /// Server acknowledged a reliable message.
    Ack(AckKind),
    /// Switch upload (stay-awake telemetry) mode.
    UploadMode(bool),
    /// Request or cancel a pump run.
    PumpActive(bool),
}

impl<'a> AppCommand<'a> {
    /// Decode a message.  `Ok(None)` means "not for us".
    pub fn parse(topic: &str, payload: &'a [u8]) -> Result<Option<Self>, ParseError> {
        match topic {
            protocol::CONFIG_TOPIC => Ok(Some(Self::Configure(payload))),
            protocol::UPLOAD_MODE_TOPIC => {
                protocol::parse_switch(payload).map(|on| Some(Self::UploadMode(on)))
            }
            protocol::PUMP_ACTIVE_CMND_TOPIC => {
                protocol::parse_switch(payload).map(|on| Some(Self::PumpActive(on)))
            }
            protocol::ACK_TOPIC => {
                let token = protocol::command_word(payload)?;
                match AckKind::from_token(token) {
                    Some(kind) => Ok(Some(Self::Ack(kind))),
                    None => {
                        debug!("ignoring unknown ack token {:?}", token);
                        Ok(None)
                    }
                }
            }
            other => {
                debug!("ignoring message on {}", other);
                Ok(None)
            }
        }
    }
}
