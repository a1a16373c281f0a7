//! Running event bus: the broker plus its background tasks.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::ports::{AllowAllChannels, ChannelPolicy, LocalOnlyBridge, PublishBridge};

use super::broker::{Broker, BrokerSettings};
use super::liveness::LivenessMonitor;
use super::publisher::BusPublisher;
use super::router::MessageRouter;

/// Owns the broker, the router task and the liveness task.
///
/// Must be started inside a Tokio runtime.
pub struct EventBus {
    broker: Arc<Broker>,
    router: Arc<MessageRouter>,
    publisher: BusPublisher,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl EventBus {
    /// Starts a single-process bus with the default policy and bridge.
    pub fn start(settings: BrokerSettings) -> Self {
        Self::start_with(settings, Arc::new(AllowAllChannels), Arc::new(LocalOnlyBridge))
    }

    pub fn start_with(
        settings: BrokerSettings,
        policy: Arc<dyn ChannelPolicy>,
        bridge: Arc<dyn PublishBridge>,
    ) -> Self {
        let (queue_tx, queue_rx) = mpsc::channel(settings.publish_queue_capacity.max(1));
        let broker = Arc::new(Broker::with_policy(settings, policy));
        let router = Arc::new(MessageRouter::new(broker.clone()));
        let monitor = LivenessMonitor::new(broker.clone());

        let router_task = {
            let router = router.clone();
            let shutdown = broker.shutdown_signal();
            tokio::spawn(async move { router.run(queue_rx, shutdown).await })
        };
        let liveness_task = {
            let shutdown = broker.shutdown_signal();
            tokio::spawn(async move { monitor.run(shutdown).await })
        };

        tracing::info!(
            bridge = bridge.name(),
            ping_interval_secs = broker.settings().ping_interval.as_secs(),
            pong_timeout_secs = broker.settings().pong_timeout.as_secs(),
            "Event bus started"
        );

        Self {
            broker,
            router,
            publisher: BusPublisher::with_bridge(queue_tx, bridge),
            tasks: Mutex::new(vec![router_task, liveness_task]),
        }
    }

    pub fn broker(&self) -> &Arc<Broker> {
        &self.broker
    }

    pub fn router(&self) -> &Arc<MessageRouter> {
        &self.router
    }

    /// A publisher for producers. Clones share the same queue.
    pub fn publisher(&self) -> BusPublisher {
        self.publisher.clone()
    }

    /// Closes every connection and waits for the background tasks to stop.
    pub async fn shutdown(&self) {
        self.broker.shutdown().await;

        let tasks: Vec<JoinHandle<()>> = self.tasks.lock().await.drain(..).collect();
        for task in tasks {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Event bus task failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::bus::{ChannelName, CloseReason, PublishError};
    use crate::domain::foundation::{Identity, UserId};
    use crate::adapters::websocket::connection::OutboundFrame;
    use serde_json::json;

    #[tokio::test]
    async fn published_event_reaches_subscriber() {
        let bus = EventBus::start(BrokerSettings::default());
        let identity = Identity::new(UserId::new("user-1").unwrap());
        let (conn, mut inbox) = bus.broker().open_connection(identity);
        let id = conn.id();
        bus.broker().admit(conn).await.unwrap();
        bus.broker()
            .subscribe(id, &ChannelName::parse("inventory").unwrap())
            .await
            .unwrap();

        bus.publisher()
            .publish_event("inventory", "low_stock", json!({"sku": "X1"}))
            .await
            .unwrap();

        let frame = inbox.outbound.recv().await.unwrap();
        assert!(matches!(frame, OutboundFrame::Text(ref text) if text.contains("low_stock")));

        bus.shutdown().await;
        assert_eq!(inbox.closed.await.unwrap(), CloseReason::ServerShutdown);
    }

    #[tokio::test]
    async fn publish_after_shutdown_is_bus_closed() {
        let bus = EventBus::start(BrokerSettings::default());
        bus.shutdown().await;

        let result = bus
            .publisher()
            .publish_event("inventory", "low_stock", json!({}))
            .await;
        assert_eq!(result, Err(PublishError::BusClosed));
    }
}
