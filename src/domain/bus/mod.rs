//! Event bus domain: channels, envelopes, connection lifecycle and errors.
//!
//! Pure value types; the broker that owns live connections lives in
//! `adapters::websocket`.

mod channel;
mod envelope;
mod errors;
mod lifecycle;

pub use channel::{ChannelName, MAX_CHANNEL_NAME_LEN};
pub use envelope::{EventEnvelope, PublishRequest};
pub use errors::{ProtocolViolation, PublishError, RegistryError};
pub use lifecycle::{CloseReason, ConnectionState};
