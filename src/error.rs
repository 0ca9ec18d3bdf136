//! Unified error types for the SolarStation firmware.
//!
//! A single `Error` enum that every subsystem can convert into, keeping the
//! control loop's error handling uniform.  All variants are `Copy` so they
//! can be passed through the controller and logged without allocation.
//!
//! Most failures in this firmware are *not* errors in the `Result` sense:
//! a missing acknowledgment is retried on the next tick, and an exhausted
//! budget ends in a [`ShutdownCause`].  Only malformed inbound payloads and
//! transport rejections surface as values.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// An inbound payload could not be decoded.
    Parse(ParseError),
    /// The transport refused a publish.
    Publish(PublishError),
    /// Configuration is invalid.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(e) => write!(f, "parse: {e}"),
            Self::Publish(e) => write!(f, "publish: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Parse errors
// ---------------------------------------------------------------------------

/// A configuration or command payload was rejected wholesale.
///
/// The `&'static str` names the offending field.  The previous
/// configuration is always retained when this is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    Malformed(&'static str),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed(field) => write!(f, "malformed payload ({field})"),
        }
    }
}

impl From<ParseError> for Error {
    fn from(e: ParseError) -> Self {
        Self::Parse(e)
    }
}

// ---------------------------------------------------------------------------
// Publish errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishError {
    /// Transport is not connected to the broker.
    Disconnected,
    /// The client refused the message (queue full, payload too large).
    Rejected,
}

impl fmt::Display for PublishError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "transport disconnected"),
            Self::Rejected => write!(f, "publish rejected"),
        }
    }
}

impl From<PublishError> for Error {
    fn from(e: PublishError) -> Self {
        Self::Publish(e)
    }
}

// ---------------------------------------------------------------------------
// Shutdown causes
// ---------------------------------------------------------------------------

/// Why the device abandoned its cycle and went to sleep unconditionally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownCause {
    /// Too long since the last handshake.
    SessionTimeout,
    /// The shared publish-attempt counter reached its ceiling.
    RetryBudgetExhausted,
    /// Battery below the survival level.
    HardCutoff,
    /// WiFi or broker unreachable for too many reconnect attempts.
    LinkLost,
}

impl fmt::Display for ShutdownCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SessionTimeout => write!(f, "session timeout"),
            Self::RetryBudgetExhausted => write!(f, "retry budget exhausted"),
            Self::HardCutoff => write!(f, "battery hard cutoff"),
            Self::LinkLost => write!(f, "link lost"),
        }
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
