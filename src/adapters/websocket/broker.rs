//! The broker: shared registry state plus admission, removal and shutdown.
//!
//! One `Broker` is constructed per process and handed out as `Arc<Broker>`.
//! The router, the liveness monitor and every connection task go through it.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex, MutexGuard};
use tokio::time::Instant;

use crate::config::BusConfig;
use crate::domain::bus::{ChannelName, CloseReason, RegistryError};
use crate::domain::foundation::{ConnectionId, Identity};
use crate::ports::{AllowAllChannels, ChannelPolicy};

use super::connection::{Connection, ConnectionInbox};
use super::registry::ConnectionRegistry;

/// Runtime knobs of the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerSettings {
    pub ping_interval: Duration,
    pub pong_timeout: Duration,
    pub outbound_queue_capacity: usize,
    pub publish_queue_capacity: usize,
    /// How long fan-out waits on a full outbound queue. Zero fails at once.
    pub send_timeout: Duration,
    pub max_malformed_frames: u32,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(30),
            pong_timeout: Duration::from_secs(60),
            outbound_queue_capacity: 64,
            publish_queue_capacity: 1024,
            send_timeout: Duration::ZERO,
            max_malformed_frames: 10,
        }
    }
}

impl From<&BusConfig> for BrokerSettings {
    fn from(config: &BusConfig) -> Self {
        Self {
            ping_interval: config.ping_interval(),
            pong_timeout: config.pong_timeout(),
            outbound_queue_capacity: config.outbound_queue_capacity,
            publish_queue_capacity: config.publish_queue_capacity,
            send_timeout: config.send_timeout(),
            max_malformed_frames: config.max_malformed_frames,
        }
    }
}

/// Result of a subscribe request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeOutcome {
    /// Subscription recorded. `newly` is false for an idempotent repeat.
    Subscribed { newly: bool },
    /// The channel policy refused it.
    Forbidden,
}

/// Counts reported by the health endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrokerStats {
    pub connections: usize,
    pub channels: usize,
}

pub struct Broker {
    registry: Mutex<ConnectionRegistry>,
    policy: Arc<dyn ChannelPolicy>,
    settings: BrokerSettings,
    shutdown_tx: watch::Sender<bool>,
}

impl Broker {
    pub fn new(settings: BrokerSettings) -> Self {
        Self::with_policy(settings, Arc::new(AllowAllChannels))
    }

    pub fn with_policy(settings: BrokerSettings, policy: Arc<dyn ChannelPolicy>) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            registry: Mutex::new(ConnectionRegistry::new()),
            policy,
            settings,
            shutdown_tx,
        }
    }

    pub fn settings(&self) -> &BrokerSettings {
        &self.settings
    }

    /// Locks the registry. Hold the guard only for bookkeeping, never across I/O.
    pub(crate) async fn registry(&self) -> MutexGuard<'_, ConnectionRegistry> {
        self.registry.lock().await
    }

    /// Creates a connection record for an authenticated identity.
    pub fn open_connection(&self, identity: Identity) -> (Connection, ConnectionInbox) {
        Connection::open(
            ConnectionId::new(),
            identity,
            self.settings.outbound_queue_capacity,
            Instant::now(),
        )
    }

    /// Registers an authenticated connection and marks it active.
    pub async fn admit(&self, connection: Connection) -> Result<(), RegistryError> {
        let id = connection.id();
        let user_id = connection.identity().user_id.clone();
        let mut registry = self.registry().await;
        // Checked under the lock: `shutdown` flips the flag before draining.
        if self.is_shutting_down() {
            return Err(RegistryError::ShuttingDown);
        }
        match registry.admit(connection) {
            Ok(()) => {
                tracing::info!(
                    connection_id = %id,
                    user_id = %user_id,
                    connections = registry.len(),
                    "Connection admitted"
                );
                Ok(())
            }
            Err(e) => {
                if e.is_invariant_violation() {
                    tracing::error!(connection_id = %id, error = %e, "Connection admission rejected");
                }
                Err(e)
            }
        }
    }

    /// Removes a connection from both registries. Safe to call more than once.
    pub async fn remove(&self, id: ConnectionId, reason: CloseReason) -> bool {
        let removed = self.registry().await.remove(id, reason);
        match removed {
            Some(connection) => {
                tracing::info!(
                    connection_id = %id,
                    user_id = %connection.identity().user_id,
                    reason = reason.as_str(),
                    "Connection removed"
                );
                true
            }
            None => false,
        }
    }

    /// Records a liveness acknowledgment at the current instant.
    pub async fn touch(&self, id: ConnectionId) -> Result<(), RegistryError> {
        self.touch_at(id, Instant::now()).await
    }

    pub async fn touch_at(&self, id: ConnectionId, now: Instant) -> Result<(), RegistryError> {
        self.registry().await.touch(id, now)
    }

    /// Subscribes a connection to a channel, subject to the channel policy.
    pub async fn subscribe(
        &self,
        id: ConnectionId,
        channel: &ChannelName,
    ) -> Result<SubscribeOutcome, RegistryError> {
        let mut registry = self.registry().await;
        let allowed = self
            .policy
            .can_subscribe(registry.get(id)?.identity(), channel);
        if !allowed {
            tracing::warn!(connection_id = %id, channel = %channel, "Subscription forbidden");
            return Ok(SubscribeOutcome::Forbidden);
        }

        let newly = registry.subscribe(id, channel)?;
        tracing::debug!(connection_id = %id, channel = %channel, newly, "Subscribed");
        Ok(SubscribeOutcome::Subscribed { newly })
    }

    /// Unsubscribes a connection. Returns false if it was not subscribed.
    pub async fn unsubscribe(
        &self,
        id: ConnectionId,
        channel: &ChannelName,
    ) -> Result<bool, RegistryError> {
        let removed = self.registry().await.unsubscribe(id, channel)?;
        tracing::debug!(connection_id = %id, channel = %channel, removed, "Unsubscribed");
        Ok(removed)
    }

    pub async fn subscribers_of(&self, channel: &ChannelName) -> Vec<ConnectionId> {
        self.registry().await.subscribers_of(channel)
    }

    pub async fn subscriptions_of(
        &self,
        id: ConnectionId,
    ) -> Result<Vec<ChannelName>, RegistryError> {
        Ok(self
            .registry()
            .await
            .get(id)?
            .subscriptions()
            .iter()
            .cloned()
            .collect())
    }

    pub async fn is_connected(&self, id: ConnectionId) -> bool {
        self.registry().await.contains(id)
    }

    pub async fn stats(&self) -> BrokerStats {
        let registry = self.registry().await;
        BrokerStats {
            connections: registry.len(),
            channels: registry.channel_count(),
        }
    }

    /// Receiver that flips to `true` once shutdown starts.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    /// Stops background tasks and closes every connection with `ServerShutdown`.
    ///
    /// Returns the number of connections closed.
    pub async fn shutdown(&self) -> usize {
        self.shutdown_tx.send_replace(true);
        let drained = self.registry().await.drain(CloseReason::ServerShutdown);
        tracing::info!(connections = drained.len(), "Broker shut down");
        drained.len()
    }
}
