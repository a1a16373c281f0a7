//! Message router: inbound client frames and outbound event fan-out.
//!
//! # Architecture
//!
//! ```text
//! EventPublisher ──► publish queue ──► router task ──► outbound queues ──► sockets
//!                                      (one, serial)   (one per connection)
//! ```
//!
//! A single router task drains the publish queue, so events on a channel
//! reach every subscriber in the order they were published.

use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};

use crate::domain::bus::{CloseReason, EventEnvelope, ProtocolViolation, RegistryError};
use crate::domain::foundation::ConnectionId;

use super::broker::{Broker, SubscribeOutcome};
use super::connection::{OutboundFrame, OutboundSender};
use super::messages::{ChannelField, ClientMessage, ServerMessage};

/// What the connection task should do after an inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundAction {
    Reply(ServerMessage),
    Ignore,
    /// Close the connection, optionally sending `notice` first.
    Close {
        reason: CloseReason,
        notice: Option<ServerMessage>,
    },
}

/// Per-connection malformed frame budget.
#[derive(Debug, Clone)]
pub struct FrameGuard {
    malformed: u32,
    limit: u32,
}

impl FrameGuard {
    pub fn new(limit: u32) -> Self {
        Self { malformed: 0, limit }
    }

    /// Counts one malformed frame. Fails once the budget is exceeded.
    pub fn record_malformed(&mut self) -> Result<u32, ProtocolViolation> {
        self.malformed = self.malformed.saturating_add(1);
        if self.malformed > self.limit {
            Err(ProtocolViolation::AbuseThresholdExceeded {
                count: self.malformed,
            })
        } else {
            Ok(self.malformed)
        }
    }

    pub fn malformed(&self) -> u32 {
        self.malformed
    }
}

/// Outcome of fanning one event out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FanOutReport {
    pub recipients: usize,
    pub delivered: usize,
    pub failed: Vec<ConnectionId>,
}

pub struct MessageRouter {
    broker: Arc<Broker>,
}

impl MessageRouter {
    pub fn new(broker: Arc<Broker>) -> Self {
        Self { broker }
    }

    pub fn broker(&self) -> &Arc<Broker> {
        &self.broker
    }

    /// Dispatches a client text frame.
    pub async fn route_text(
        &self,
        id: ConnectionId,
        text: &str,
        guard: &mut FrameGuard,
    ) -> InboundAction {
        let message = match ClientMessage::parse(text) {
            Ok(message) => message,
            Err(violation) => return self.malformed(id, violation, guard),
        };

        match message {
            ClientMessage::Ping => {
                self.touch(id).await;
                InboundAction::Reply(ServerMessage::Pong)
            }
            ClientMessage::Pong => {
                self.touch(id).await;
                InboundAction::Ignore
            }
            ClientMessage::Subscribe { channel } => self.subscribe(id, &channel).await,
            ClientMessage::Unsubscribe { channel } => self.unsubscribe(id, &channel).await,
        }
    }

    /// Binary frames are not part of the protocol.
    pub fn route_binary(&self, id: ConnectionId, guard: &mut FrameGuard) -> InboundAction {
        self.malformed(
            id,
            ProtocolViolation::MalformedFrame("binary frames are not supported".to_string()),
            guard,
        )
    }

    async fn touch(&self, id: ConnectionId) {
        if let Err(e) = self.broker.touch(id).await {
            tracing::trace!(connection_id = %id, error = %e, "Touch on departed connection");
        }
    }

    async fn subscribe(&self, id: ConnectionId, field: &ChannelField) -> InboundAction {
        let channel = match field.to_channel() {
            Ok(channel) => channel,
            Err(e) => {
                let violation = ProtocolViolation::InvalidChannel(e);
                tracing::warn!(connection_id = %id, error = %violation, "Invalid subscribe");
                return InboundAction::Close {
                    reason: CloseReason::ProtocolError,
                    notice: Some(ServerMessage::violation(&violation)),
                };
            }
        };

        match self.broker.subscribe(id, &channel).await {
            Ok(SubscribeOutcome::Subscribed { .. }) => {
                InboundAction::Reply(ServerMessage::subscribed(channel.as_str()))
            }
            Ok(SubscribeOutcome::Forbidden) => InboundAction::Reply(ServerMessage::error(
                "FORBIDDEN",
                format!("not allowed to subscribe to {}", channel),
            )),
            Err(e) => registry_failure(id, e),
        }
    }

    async fn unsubscribe(&self, id: ConnectionId, field: &ChannelField) -> InboundAction {
        // A name that could never have been subscribed is simply not subscribed.
        let Ok(channel) = field.to_channel() else {
            return InboundAction::Reply(ServerMessage::unsubscribed(field.as_text().trim()));
        };

        match self.broker.unsubscribe(id, &channel).await {
            Ok(_) => InboundAction::Reply(ServerMessage::unsubscribed(channel.as_str())),
            Err(e) => registry_failure(id, e),
        }
    }

    fn malformed(
        &self,
        id: ConnectionId,
        violation: ProtocolViolation,
        guard: &mut FrameGuard,
    ) -> InboundAction {
        match guard.record_malformed() {
            Ok(count) => {
                tracing::debug!(connection_id = %id, count, error = %violation, "Malformed frame");
                InboundAction::Reply(ServerMessage::violation(&violation))
            }
            Err(exceeded) => {
                tracing::warn!(connection_id = %id, error = %exceeded, "Closing abusive connection");
                InboundAction::Close {
                    reason: CloseReason::ProtocolError,
                    notice: Some(ServerMessage::violation(&exceeded)),
                }
            }
        }
    }

    /// Delivers one event to every current subscriber of its channel.
    ///
    /// Subscribers whose queue rejects the frame are removed with
    /// `SendFailed`; nobody else is affected.
    pub async fn fan_out(&self, envelope: &EventEnvelope) -> FanOutReport {
        let targets = self.broker.registry().await.outbound_for(&envelope.channel);
        let mut report = FanOutReport {
            recipients: targets.len(),
            ..FanOutReport::default()
        };
        if targets.is_empty() {
            tracing::trace!(channel = %envelope.channel, "No subscribers");
            return report;
        }

        let frame = match ServerMessage::event(envelope).to_json() {
            Ok(json) => OutboundFrame::Text(Arc::from(json)),
            Err(e) => {
                tracing::error!(channel = %envelope.channel, error = %e, "Event serialization failed");
                return report;
            }
        };

        for (id, outbound) in targets {
            if self.send(&outbound, frame.clone()).await {
                report.delivered += 1;
            } else {
                report.failed.push(id);
            }
        }

        for &id in &report.failed {
            tracing::warn!(
                connection_id = %id,
                channel = %envelope.channel,
                event_type = %envelope.event_type,
                "Outbound queue rejected event"
            );
            self.broker.remove(id, CloseReason::SendFailed).await;
        }

        tracing::debug!(
            channel = %envelope.channel,
            event_type = %envelope.event_type,
            recipients = report.recipients,
            delivered = report.delivered,
            "Event fanned out"
        );
        report
    }

    async fn send(&self, outbound: &OutboundSender, frame: OutboundFrame) -> bool {
        let timeout = self.broker.settings().send_timeout;
        match outbound.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(frame)) if !timeout.is_zero() => {
                outbound.send_timeout(frame, timeout).await.is_ok()
            }
            Err(_) => false,
        }
    }

    /// Drains the publish queue until shutdown or until every publisher is gone.
    pub async fn run(
        &self,
        mut events: mpsc::Receiver<EventEnvelope>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        if *shutdown.borrow() {
            return;
        }

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::debug!("Router stopping");
                        return;
                    }
                }

                envelope = events.recv() => match envelope {
                    Some(envelope) => {
                        self.fan_out(&envelope).await;
                    }
                    None => return,
                },
            }
        }
    }
}

fn registry_failure(id: ConnectionId, error: RegistryError) -> InboundAction {
    if error.is_invariant_violation() {
        tracing::error!(connection_id = %id, error = %error, "Registry invariant violated");
        InboundAction::Close {
            reason: CloseReason::InternalError,
            notice: None,
        }
    } else {
        // Removed concurrently; the close signal is already on its way.
        InboundAction::Ignore
    }
}
