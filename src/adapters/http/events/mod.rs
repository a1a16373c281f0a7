//! HTTP adapter for producer ingress and health.

mod dto;
mod handlers;
mod routes;

pub use dto::{ErrorResponse, HealthResponse, PublishedEventResponse};
pub use handlers::EventHandlers;
pub use routes::event_routes;
