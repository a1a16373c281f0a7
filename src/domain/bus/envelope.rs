//! Event envelopes: the unit of publication.

use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::domain::foundation::Timestamp;

use super::{ChannelName, PublishError};

/// Raw publication request as handed over by a producer.
///
/// Nothing here is trusted; [`EventEnvelope::from_request`] validates it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishRequest {
    pub channel: String,
    pub event_type: String,
    #[serde(default = "empty_payload")]
    pub payload: JsonValue,
}

fn empty_payload() -> JsonValue {
    JsonValue::Object(Default::default())
}

impl PublishRequest {
    pub fn new(
        channel: impl Into<String>,
        event_type: impl Into<String>,
        payload: JsonValue,
    ) -> Self {
        Self {
            channel: channel.into(),
            event_type: event_type.into(),
            payload,
        }
    }
}

/// A validated event ready for fan-out.
///
/// The payload is opaque to the bus and is delivered unmodified.
#[derive(Debug, Clone, PartialEq)]
pub struct EventEnvelope {
    pub channel: ChannelName,
    pub event_type: String,
    pub payload: JsonValue,
    pub published_at: Timestamp,
}

impl EventEnvelope {
    /// Validates a request and stamps it with the publication time.
    ///
    /// # Errors
    ///
    /// - `PublishError::InvalidChannel` if the channel name is missing or malformed
    /// - `PublishError::MissingEventType` if the event type is blank
    pub fn from_request(
        request: PublishRequest,
        published_at: Timestamp,
    ) -> Result<Self, PublishError> {
        let channel = ChannelName::parse(&request.channel).map_err(PublishError::InvalidChannel)?;
        let event_type = request.event_type.trim();
        if event_type.is_empty() {
            return Err(PublishError::MissingEventType);
        }

        Ok(Self {
            channel,
            event_type: event_type.to_string(),
            payload: request.payload,
            published_at,
        })
    }
}
