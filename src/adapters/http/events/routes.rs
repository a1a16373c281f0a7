//! HTTP routes for producer ingress and health.

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::adapters::http::middleware::{publisher_key_middleware, PublisherKey};

use super::handlers::{health, publish_event, EventHandlers};

/// Creates the producer router. Only `/api/events` is guarded by the publisher key.
pub fn event_routes(handlers: EventHandlers, key: PublisherKey) -> Router {
    let publish = Router::new()
        .route("/api/events", post(publish_event))
        .route_layer(middleware::from_fn_with_state(key, publisher_key_middleware));

    Router::new()
        .route("/health", get(health))
        .merge(publish)
        .with_state(handlers)
}
