//! Foundation module - Shared domain primitives.
//!
//! Contains identifiers, timestamps, authentication and error types
//! that form the vocabulary of the event bus.

mod auth;
mod errors;
mod ids;
mod state_machine;
mod timestamp;

pub use auth::{AuthError, Identity};
pub use errors::ValidationError;
pub use ids::{ConnectionId, UserId};
pub use state_machine::StateMachine;
pub use timestamp::Timestamp;
