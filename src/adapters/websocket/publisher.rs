//! Event publisher handed to producers.
//!
//! # Event Flow
//!
//! ```text
//! Producer calls publish()
//!          │
//!          ▼
//! ┌────────────────────┐
//! │  Validate + stamp  │──► InvalidChannel / MissingEventType
//! └────────────────────┘
//!          │
//!          ▼
//! ┌────────────────────┐
//! │  Publish queue     │──► BusClosed once the router is gone
//! └────────────────────┘
//!          │
//!          ▼
//! ┌────────────────────┐
//! │  PublishBridge     │──► failures logged only
//! └────────────────────┘
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tokio::sync::mpsc;

use crate::domain::bus::{EventEnvelope, PublishError, PublishRequest};
use crate::domain::foundation::Timestamp;
use crate::ports::{EventPublisher, LocalOnlyBridge, PublishBridge};

/// `EventPublisher` backed by the router's publish queue.
///
/// Cheap to clone; every producer may hold its own copy.
#[derive(Clone)]
pub struct BusPublisher {
    queue: mpsc::Sender<EventEnvelope>,
    bridge: Arc<dyn PublishBridge>,
}

impl BusPublisher {
    pub fn new(queue: mpsc::Sender<EventEnvelope>) -> Self {
        Self::with_bridge(queue, Arc::new(LocalOnlyBridge))
    }

    pub fn with_bridge(queue: mpsc::Sender<EventEnvelope>, bridge: Arc<dyn PublishBridge>) -> Self {
        Self { queue, bridge }
    }

    /// Shorthand for `publish(PublishRequest::new(..))`.
    pub async fn publish_event(
        &self,
        channel: &str,
        event_type: &str,
        payload: JsonValue,
    ) -> Result<EventEnvelope, PublishError> {
        self.publish(PublishRequest::new(channel, event_type, payload))
            .await
    }
}

#[async_trait]
impl EventPublisher for BusPublisher {
    async fn publish(&self, request: PublishRequest) -> Result<EventEnvelope, PublishError> {
        let envelope = EventEnvelope::from_request(request, Timestamp::now())?;

        self.queue
            .send(envelope.clone())
            .await
            .map_err(|_| PublishError::BusClosed)?;

        if let Err(e) = self.bridge.forward(&envelope).await {
            tracing::warn!(
                bridge = self.bridge.name(),
                channel = %envelope.channel,
                event_type = %envelope.event_type,
                error = %e,
                "Bridge forward failed"
            );
        }

        tracing::debug!(
            channel = %envelope.channel,
            event_type = %envelope.event_type,
            "Event published"
        );
        Ok(envelope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::BridgeError;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FailingBridge {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PublishBridge for FailingBridge {
        async fn forward(&self, _envelope: &EventEnvelope) -> Result<(), BridgeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(BridgeError::Unavailable("peer down".to_string()))
        }

        fn name(&self) -> &'static str {
            "FailingBridge"
        }
    }

    #[tokio::test]
    async fn publish_enqueues_stamped_envelope() {
        let (tx, mut rx) = mpsc::channel(4);
        let publisher = BusPublisher::new(tx);

        let envelope = publisher
            .publish_event("inventory", "low_stock", json!({"sku": "X1"}))
            .await
            .unwrap();

        assert_eq!(rx.recv().await.unwrap(), envelope);
        assert_eq!(envelope.channel.as_str(), "inventory");
    }

    #[tokio::test]
    async fn invalid_channel_is_rejected_before_queueing() {
        let (tx, mut rx) = mpsc::channel(4);
        let publisher = BusPublisher::new(tx);

        let result = publisher.publish_event("", "low_stock", json!({})).await;

        assert!(matches!(result, Err(PublishError::InvalidChannel(_))));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn missing_event_type_is_rejected() {
        let (tx, _rx) = mpsc::channel(4);
        let publisher = BusPublisher::new(tx);

        let result = publisher.publish_event("inventory", "  ", json!({})).await;
        assert_eq!(result, Err(PublishError::MissingEventType));
    }

    #[tokio::test]
    async fn closed_queue_reports_bus_closed() {
        let (tx, rx) = mpsc::channel(4);
        drop(rx);
        let publisher = BusPublisher::new(tx);

        let result = publisher.publish_event("inventory", "low_stock", json!({})).await;
        assert_eq!(result, Err(PublishError::BusClosed));
    }

    #[tokio::test]
    async fn bridge_failure_does_not_fail_publish() {
        let (tx, mut rx) = mpsc::channel(4);
        let bridge = Arc::new(FailingBridge {
            calls: AtomicUsize::new(0),
        });
        let publisher = BusPublisher::with_bridge(tx, bridge.clone());

        assert!(publisher
            .publish_event("orders", "created", json!({"id": 7}))
            .await
            .is_ok());
        assert_eq!(bridge.calls.load(Ordering::SeqCst), 1);
        assert!(rx.recv().await.is_some());
    }
}
