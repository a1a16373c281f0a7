//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the bus to the outside world:
//! - `auth` - Token validators (JWT, mock)
//! - `websocket` - The broker, its background tasks and the WebSocket endpoint
//! - `http` - Producer ingress, health and the application router

pub mod auth;
pub mod http;
pub mod websocket;

pub use auth::{JwtTokenValidator, MockTokenValidator};
pub use http::{app_router, AppState};
pub use websocket::{Broker, BrokerSettings, BusPublisher, EventBus};
