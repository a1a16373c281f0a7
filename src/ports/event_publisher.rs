//! EventPublisher port - ingress for external producers.
//!
//! Inventory and order services inject events through this port without
//! knowing anything about sockets, channels or subscribers.

use async_trait::async_trait;

use crate::domain::bus::{EventEnvelope, PublishError, PublishRequest};

/// Port for publishing events onto the bus.
///
/// Implementations must:
/// - Be callable concurrently by any number of producers
/// - Return as soon as the event is handed to the router, not once delivered
/// - Treat a channel with no subscribers as a successful no-op
/// - Fail only on malformed input (or a closed bus), never on delivery problems
///
/// # Example
///
/// ```ignore
/// let request = PublishRequest::new("inventory", "low_stock", json!({"sku": "X1"}));
/// publisher.publish(request).await?;
/// ```
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Validate, stamp and enqueue an event for fan-out.
    ///
    /// Returns the stamped envelope.
    async fn publish(&self, request: PublishRequest) -> Result<EventEnvelope, PublishError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Compile-time check that trait is object-safe
    #[allow(dead_code)]
    fn assert_object_safe(_: &dyn EventPublisher) {}

    #[test]
    fn event_publisher_trait_object_is_send_sync() {
        fn assert_send_sync<T: Send + Sync + ?Sized>() {}
        assert_send_sync::<dyn EventPublisher>();
    }
}
