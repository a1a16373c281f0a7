//! Request/response types for the producer endpoints.

use serde::Serialize;

use crate::adapters::websocket::BrokerStats;
use crate::domain::bus::EventEnvelope;

/// Stamped envelope echoed back to the producer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishedEventResponse {
    pub channel: String,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub published_at: String,
}

impl From<EventEnvelope> for PublishedEventResponse {
    fn from(envelope: EventEnvelope) -> Self {
        Self {
            channel: envelope.channel.as_str().to_string(),
            published_at: envelope.published_at.to_wire(),
            event_type: envelope.event_type,
            payload: envelope.payload,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub connections: usize,
    pub channels: usize,
}

impl HealthResponse {
    pub fn from_stats(stats: BrokerStats, shutting_down: bool) -> Self {
        Self {
            status: if shutting_down { "shutting_down" } else { "ok" },
            connections: stats.connections,
            channels: stats.channels,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            code: "BAD_REQUEST".to_string(),
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            code: "SERVICE_UNAVAILABLE".to_string(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::bus::PublishRequest;
    use crate::domain::foundation::Timestamp;

    #[test]
    fn published_event_response_uses_camel_case() {
        let envelope = EventEnvelope::from_request(
            PublishRequest::new("orders", "created", serde_json::json!({"id": 1})),
            Timestamp::now(),
        )
        .unwrap();

        let json = serde_json::to_value(PublishedEventResponse::from(envelope)).unwrap();
        assert_eq!(json["eventType"], "created");
        assert!(json["publishedAt"].is_string());
    }

    #[test]
    fn health_reports_shutdown() {
        let stats = BrokerStats {
            connections: 3,
            channels: 2,
        };
        assert_eq!(HealthResponse::from_stats(stats, false).status, "ok");
        assert_eq!(HealthResponse::from_stats(stats, true).status, "shutting_down");
    }
}
