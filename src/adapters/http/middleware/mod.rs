//! HTTP middleware for axum.
//!
//! This module contains middleware layers for cross-cutting concerns:
//!
//! - `auth` - Bearer token extraction and the producer key guard

pub mod auth;

pub use auth::{bearer_token, publisher_key_middleware, PublisherKey, PUBLISHER_KEY_HEADER};
