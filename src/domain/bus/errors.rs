//! Error taxonomy of the event bus.

use thiserror::Error;

use crate::domain::foundation::{ConnectionId, ValidationError};

use super::ConnectionState;

/// Registry failures.
///
/// `DuplicateId` and `InvalidState` are internal invariant violations:
/// they are logged as defects and the offending connection is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("connection {0} is already registered")]
    DuplicateId(ConnectionId),

    #[error("connection {0} not found")]
    NotFound(ConnectionId),

    #[error("connection {id} cannot be admitted from state {state:?}")]
    InvalidState {
        id: ConnectionId,
        state: ConnectionState,
    },

    #[error("broker is shutting down")]
    ShuttingDown,
}

impl RegistryError {
    /// Returns true if this error signals a broken invariant rather than a race.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            RegistryError::DuplicateId(_) | RegistryError::InvalidState { .. }
        )
    }
}

/// Client frames that break the protocol.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolViolation {
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    #[error("invalid channel: {0}")]
    InvalidChannel(ValidationError),

    #[error("too many malformed frames ({count})")]
    AbuseThresholdExceeded { count: u32 },
}

impl ProtocolViolation {
    /// Wire error code sent to the client.
    pub fn code(&self) -> &'static str {
        match self {
            ProtocolViolation::MalformedFrame(_) => "MALFORMED_FRAME",
            ProtocolViolation::InvalidChannel(_) => "INVALID_CHANNEL",
            ProtocolViolation::AbuseThresholdExceeded { .. } => "ABUSE_THRESHOLD_EXCEEDED",
        }
    }
}

/// Failures returned to producers by `Publish`.
///
/// Delivery problems never show up here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublishError {
    #[error("invalid channel: {0}")]
    InvalidChannel(ValidationError),

    #[error("event type is required")]
    MissingEventType,

    #[error("event bus is closed")]
    BusClosed,
}

impl PublishError {
    /// Returns true if the producer sent a malformed envelope.
    pub fn is_input_error(&self) -> bool {
        !matches!(self, PublishError::BusClosed)
    }
}
