//! WebSocket message types for the event bus protocol.
//!
//! - Server → Client: connection status, acknowledgments, events, errors, pongs
//! - Client → Server: pings, pongs, subscribe/unsubscribe requests

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::domain::bus::{ChannelName, EventEnvelope, ProtocolViolation};
use crate::domain::foundation::{ConnectionId, Identity, Timestamp, ValidationError};

// ============================================
// Server → Client Messages
// ============================================

/// All message types that can be sent from server to client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Connection authenticated and admitted.
    Connected(ConnectedMessage),

    /// Reply to a client `ping`.
    Pong,

    /// Subscription recorded.
    Subscribed(ChannelAck),

    /// Subscription dropped (or was never there).
    Unsubscribed(ChannelAck),

    /// A published event.
    Event(EventMessage),

    /// Error occurred.
    Error(ErrorMessage),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedMessage {
    pub connection_id: String,
    pub user_id: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelAck {
    pub channel: String,
}

/// Event delivered to subscribers of `channel`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMessage {
    pub channel: String,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub published_at: String,
}

/// Error message sent to client.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorMessage {
    pub code: String,
    pub message: String,
    pub timestamp: String,
}

impl ServerMessage {
    pub fn connected(id: ConnectionId, identity: &Identity) -> Self {
        ServerMessage::Connected(ConnectedMessage {
            connection_id: id.to_string(),
            user_id: identity.user_id.as_str().to_string(),
            timestamp: Timestamp::now().to_wire(),
        })
    }

    pub fn subscribed(channel: impl Into<String>) -> Self {
        ServerMessage::Subscribed(ChannelAck {
            channel: channel.into(),
        })
    }

    pub fn unsubscribed(channel: impl Into<String>) -> Self {
        ServerMessage::Unsubscribed(ChannelAck {
            channel: channel.into(),
        })
    }

    pub fn event(envelope: &EventEnvelope) -> Self {
        ServerMessage::Event(EventMessage {
            channel: envelope.channel.as_str().to_string(),
            event_type: envelope.event_type.clone(),
            payload: envelope.payload.clone(),
            published_at: envelope.published_at.to_wire(),
        })
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        ServerMessage::Error(ErrorMessage {
            code: code.into(),
            message: message.into(),
            timestamp: Timestamp::now().to_wire(),
        })
    }

    pub fn violation(violation: &ProtocolViolation) -> Self {
        Self::error(violation.code(), violation.to_string())
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// ============================================
// Client → Server Messages
// ============================================

/// All message types that can be received from client.
///
/// Channel names arrive unvalidated so that a bad name can be told apart
/// from a frame that is not JSON at all.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Ping,

    /// Application-level liveness acknowledgment.
    Pong,

    Subscribe {
        #[serde(default)]
        channel: ChannelField,
    },

    Unsubscribe {
        #[serde(default)]
        channel: ChannelField,
    },
}

/// The `channel` field exactly as the client sent it.
///
/// Any JSON value is accepted here; a missing, `null` or non-string value
/// is an invalid channel rather than a malformed frame.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct ChannelField(Option<JsonValue>);

impl ChannelField {
    /// Validates the field as a channel name.
    pub fn to_channel(&self) -> Result<ChannelName, ValidationError> {
        match &self.0 {
            Some(JsonValue::String(raw)) => ChannelName::parse(raw),
            None | Some(JsonValue::Null) => Err(ValidationError::empty_field("channel")),
            Some(other) => Err(ValidationError::invalid_format(
                "channel",
                format!("expected a string, got {}", json_kind(other)),
            )),
        }
    }

    /// The raw text when the field is a string, otherwise empty.
    pub fn as_text(&self) -> &str {
        match &self.0 {
            Some(JsonValue::String(raw)) => raw,
            _ => "",
        }
    }
}

impl From<&str> for ChannelField {
    fn from(raw: &str) -> Self {
        Self(Some(JsonValue::String(raw.to_string())))
    }
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}

impl ClientMessage {
    pub fn parse(text: &str) -> Result<Self, ProtocolViolation> {
        serde_json::from_str(text).map_err(|e| ProtocolViolation::MalformedFrame(e.to_string()))
    }
}
