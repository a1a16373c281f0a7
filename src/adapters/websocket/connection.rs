//! Per-connection state held by the registry.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use crate::domain::bus::{ChannelName, CloseReason, ConnectionState, RegistryError};
use crate::domain::foundation::{ConnectionId, Identity, StateMachine};

/// Frames queued for a connection's socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    /// Serialized server message.
    Text(Arc<str>),
    /// Transport-level liveness probe.
    Ping,
}

/// Sending half of a connection's bounded outbound queue.
pub type OutboundSender = mpsc::Sender<OutboundFrame>;

/// Receiving side held by the connection task.
///
/// `closed` fires once the broker removes the connection, carrying the
/// reason to put in the close frame.
#[derive(Debug)]
pub struct ConnectionInbox {
    pub outbound: mpsc::Receiver<OutboundFrame>,
    pub closed: oneshot::Receiver<CloseReason>,
}

/// A client connection as tracked by the registry.
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    identity: Identity,
    subscriptions: HashSet<ChannelName>,
    last_pong_at: Instant,
    state: ConnectionState,
    outbound: OutboundSender,
    close_tx: Option<oneshot::Sender<CloseReason>>,
}

impl Connection {
    /// Creates an authenticated connection and the inbox its task reads from.
    pub fn open(
        id: ConnectionId,
        identity: Identity,
        queue_capacity: usize,
        now: Instant,
    ) -> (Self, ConnectionInbox) {
        let (outbound, outbound_rx) = mpsc::channel(queue_capacity.max(1));
        let (close_tx, closed) = oneshot::channel();

        let connection = Self {
            id,
            identity,
            subscriptions: HashSet::new(),
            last_pong_at: now,
            state: ConnectionState::Authenticated,
            outbound,
            close_tx: Some(close_tx),
        };

        (
            connection,
            ConnectionInbox {
                outbound: outbound_rx,
                closed,
            },
        )
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn subscriptions(&self) -> &HashSet<ChannelName> {
        &self.subscriptions
    }

    pub fn last_pong_at(&self) -> Instant {
        self.last_pong_at
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn outbound(&self) -> &OutboundSender {
        &self.outbound
    }

    /// True if no acknowledgment arrived within `timeout` before `now`.
    pub fn is_stale(&self, now: Instant, timeout: Duration) -> bool {
        now.saturating_duration_since(self.last_pong_at) > timeout
    }

    pub(crate) fn activate(&mut self) -> Result<(), RegistryError> {
        self.state = self
            .state
            .transition_to(ConnectionState::Active)
            .map_err(|_| RegistryError::InvalidState {
                id: self.id,
                state: self.state,
            })?;
        Ok(())
    }

    /// Records a liveness acknowledgment. Never moves the clock backwards.
    pub(crate) fn touch(&mut self, now: Instant) {
        if now > self.last_pong_at {
            self.last_pong_at = now;
        }
    }

    pub(crate) fn subscriptions_mut(&mut self) -> &mut HashSet<ChannelName> {
        &mut self.subscriptions
    }

    /// Moves to `Closing` and tells the connection task why.
    pub(crate) fn begin_closing(&mut self, reason: CloseReason) {
        if self.state.can_transition_to(&ConnectionState::Closing) {
            self.state = ConnectionState::Closing;
        }
        if let Some(close_tx) = self.close_tx.take() {
            // The task may already be gone; nothing to tell then.
            let _ = close_tx.send(reason);
        }
    }

    /// Final transition once the record has left the registry.
    pub(crate) fn finish_closing(&mut self) {
        if self.state.can_transition_to(&ConnectionState::Closed) {
            self.state = ConnectionState::Closed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::UserId;

    fn identity() -> Identity {
        Identity::new(UserId::new("user-1").unwrap())
    }

    #[test]
    fn open_starts_authenticated_without_subscriptions() {
        let (conn, _inbox) = Connection::open(ConnectionId::new(), identity(), 8, Instant::now());
        assert_eq!(conn.state(), ConnectionState::Authenticated);
        assert!(conn.subscriptions().is_empty());
    }

    #[test]
    fn activate_only_from_authenticated() {
        let (mut conn, _inbox) = Connection::open(ConnectionId::new(), identity(), 8, Instant::now());
        assert!(conn.activate().is_ok());
        assert_eq!(conn.state(), ConnectionState::Active);
        assert!(matches!(
            conn.activate(),
            Err(RegistryError::InvalidState { .. })
        ));
    }

    #[test]
    fn staleness_uses_strictly_greater_than_timeout() {
        let start = Instant::now();
        let (conn, _inbox) = Connection::open(ConnectionId::new(), identity(), 8, start);
        let timeout = Duration::from_secs(60);

        assert!(!conn.is_stale(start + timeout, timeout));
        assert!(conn.is_stale(start + timeout + Duration::from_millis(1), timeout));
    }

    #[test]
    fn touch_never_moves_backwards() {
        let start = Instant::now();
        let (mut conn, _inbox) = Connection::open(ConnectionId::new(), identity(), 8, start);
        let later = start + Duration::from_secs(10);

        conn.touch(later);
        conn.touch(start);
        assert_eq!(conn.last_pong_at(), later);
    }

    #[tokio::test]
    async fn begin_closing_signals_reason_once() {
        let (mut conn, inbox) = Connection::open(ConnectionId::new(), identity(), 8, Instant::now());
        conn.activate().unwrap();

        conn.begin_closing(CloseReason::LivenessTimeout);
        conn.begin_closing(CloseReason::ServerShutdown);

        assert_eq!(conn.state(), ConnectionState::Closing);
        assert_eq!(inbox.closed.await.unwrap(), CloseReason::LivenessTimeout);
    }

    #[test]
    fn finish_closing_requires_closing_first() {
        let (mut conn, _inbox) = Connection::open(ConnectionId::new(), identity(), 8, Instant::now());
        conn.activate().unwrap();

        conn.finish_closing();
        assert_eq!(conn.state(), ConnectionState::Active);

        conn.begin_closing(CloseReason::ClientClosed);
        conn.finish_closing();
        assert_eq!(conn.state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn outbound_queue_is_bounded() {
        let (conn, _inbox) = Connection::open(ConnectionId::new(), identity(), 1, Instant::now());
        assert!(conn.outbound().try_send(OutboundFrame::Ping).is_ok());
        assert!(conn.outbound().try_send(OutboundFrame::Ping).is_err());
    }
}
