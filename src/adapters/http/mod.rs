//! HTTP adapters - the axum surface of the bus.
//!
//! - `GET /ws` - WebSocket endpoint for browser clients
//! - `POST /api/events` - Producer ingress
//! - `GET /health` - Registry size and shutdown status

pub mod events;
pub mod middleware;

use std::sync::Arc;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::adapters::websocket::{websocket_router, EventBus, WebSocketState};
use crate::ports::TokenValidator;

pub use events::{event_routes, EventHandlers};
pub use middleware::PublisherKey;

/// Everything the HTTP surface needs from the running process.
#[derive(Clone)]
pub struct AppState {
    pub bus: Arc<EventBus>,
    pub validator: Arc<dyn TokenValidator>,
    pub publisher_key: PublisherKey,
}

impl AppState {
    pub fn new(
        bus: Arc<EventBus>,
        validator: Arc<dyn TokenValidator>,
        publisher_key: PublisherKey,
    ) -> Self {
        Self {
            bus,
            validator,
            publisher_key,
        }
    }
}

/// Builds the complete application router.
pub fn app_router(state: AppState) -> Router {
    let websocket = websocket_router().with_state(WebSocketState::new(
        state.bus.router().clone(),
        state.validator.clone(),
    ));
    let events = event_routes(
        EventHandlers::new(Arc::new(state.bus.publisher()), state.bus.broker().clone()),
        state.publisher_key.clone(),
    );

    Router::new()
        .merge(websocket)
        .merge(events)
        .layer(TraceLayer::new_for_http())
}
