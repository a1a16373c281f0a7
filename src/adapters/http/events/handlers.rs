//! HTTP handlers for producer ingress and health.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::adapters::websocket::Broker;
use crate::domain::bus::{PublishError, PublishRequest};
use crate::ports::EventPublisher;

use super::dto::{ErrorResponse, HealthResponse, PublishedEventResponse};

// ════════════════════════════════════════════════════════════════════════════
// Handler state
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone)]
pub struct EventHandlers {
    publisher: Arc<dyn EventPublisher>,
    broker: Arc<Broker>,
}

impl EventHandlers {
    pub fn new(publisher: Arc<dyn EventPublisher>, broker: Arc<Broker>) -> Self {
        Self { publisher, broker }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// HTTP handlers
// ════════════════════════════════════════════════════════════════════════════

/// POST /api/events - Publish an event to a channel
pub async fn publish_event(
    State(handlers): State<EventHandlers>,
    body: Result<Json<PublishRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::bad_request(rejection.body_text())),
            )
                .into_response();
        }
    };

    match handlers.publisher.publish(request).await {
        Ok(envelope) => (
            StatusCode::ACCEPTED,
            Json(PublishedEventResponse::from(envelope)),
        )
            .into_response(),
        Err(e) => handle_publish_error(e),
    }
}

/// GET /health - Liveness and registry size
pub async fn health(State(handlers): State<EventHandlers>) -> Json<HealthResponse> {
    let stats = handlers.broker.stats().await;
    Json(HealthResponse::from_stats(
        stats,
        handlers.broker.is_shutting_down(),
    ))
}

fn handle_publish_error(error: PublishError) -> Response {
    if error.is_input_error() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::bad_request(error.to_string())),
        )
            .into_response();
    }

    tracing::warn!(error = %error, "Publish refused");
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(ErrorResponse::unavailable(error.to_string())),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::ValidationError;

    #[test]
    fn input_errors_map_to_400() {
        let response = handle_publish_error(PublishError::MissingEventType);
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = handle_publish_error(PublishError::InvalidChannel(
            ValidationError::empty_field("channel"),
        ));
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn bus_closed_maps_to_503() {
        let response = handle_publish_error(PublishError::BusClosed);
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
