//! PublishBridge port - cross-process relay of published events.
//!
//! The bus runs as a single logical broker. A deployment that needs several
//! processes can plug a bridge in here (Redis pub/sub, NATS, ...) that
//! relays every locally published envelope to its peers.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::bus::EventEnvelope;

/// Bridge failures. Logged by the publisher, never returned to producers.
#[derive(Debug, Clone, Error)]
pub enum BridgeError {
    #[error("bridge unavailable: {0}")]
    Unavailable(String),
}

/// Relays envelopes to other broker processes.
#[async_trait]
pub trait PublishBridge: Send + Sync {
    async fn forward(&self, envelope: &EventEnvelope) -> Result<(), BridgeError>;

    /// Bridge name for logging.
    fn name(&self) -> &'static str;
}

/// Default bridge for a single-process deployment: relays nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalOnlyBridge;

#[async_trait]
impl PublishBridge for LocalOnlyBridge {
    async fn forward(&self, _envelope: &EventEnvelope) -> Result<(), BridgeError> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "LocalOnlyBridge"
    }
}
