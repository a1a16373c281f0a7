//! Ports - Interfaces for external collaborators.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the bus and the outside world. Adapters implement these ports.
//!
//! - `TokenValidator` - Turns a bearer token into an identity
//! - `EventPublisher` - Ingress used by inventory/order producers
//! - `PublishBridge` - Cross-process relay extension point
//! - `ChannelPolicy` - Per-channel authorization extension point

mod channel_policy;
mod event_publisher;
mod publish_bridge;
mod token_validator;

pub use channel_policy::{AllowAllChannels, ChannelPolicy};
pub use event_publisher::EventPublisher;
pub use publish_bridge::{BridgeError, LocalOnlyBridge, PublishBridge};
pub use token_validator::TokenValidator;
