//! Connection and channel registries.
//!
//! Two indexes describe the same relation from both sides:
//!
//! ```text
//! ConnectionRegistry            ChannelRegistry
//! conn-a { inventory, orders }  inventory → { conn-a, conn-b }
//! conn-b { inventory }          orders    → { conn-a }
//! ```
//!
//! Every mutation goes through [`ConnectionRegistry`], which updates both
//! sides in one step so that `c ∈ subscribers(ch)` holds exactly when
//! `ch ∈ subscriptions(c)`. The broker keeps the registry behind a single
//! mutex, so observers never see one side without the other.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use tokio::time::Instant;

use crate::domain::bus::{ChannelName, CloseReason, RegistryError};
use crate::domain::foundation::ConnectionId;

use super::connection::{Connection, OutboundSender};

/// Channel → subscriber index.
///
/// Channels exist only while they have subscribers; the entry is dropped
/// when the last subscriber leaves.
#[derive(Debug, Default)]
pub struct ChannelRegistry {
    channels: HashMap<ChannelName, HashSet<ConnectionId>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a subscriber. Returns false if it was already present.
    pub fn subscribe(&mut self, channel: &ChannelName, id: ConnectionId) -> bool {
        self.channels.entry(channel.clone()).or_default().insert(id)
    }

    /// Removes a subscriber. Returns false if it was not present.
    pub fn unsubscribe(&mut self, channel: &ChannelName, id: ConnectionId) -> bool {
        let Some(subscribers) = self.channels.get_mut(channel) else {
            return false;
        };
        let removed = subscribers.remove(&id);
        if subscribers.is_empty() {
            self.channels.remove(channel);
        }
        removed
    }

    /// Snapshot of the current subscribers of `channel`.
    pub fn subscribers_of(&self, channel: &ChannelName) -> Vec<ConnectionId> {
        self.channels
            .get(channel)
            .map(|subscribers| subscribers.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn contains(&self, channel: &ChannelName, id: ConnectionId) -> bool {
        self.channels
            .get(channel)
            .is_some_and(|subscribers| subscribers.contains(&id))
    }

    /// Drops `id` from each of the given channels.
    pub fn remove_connection<'a>(
        &mut self,
        id: ConnectionId,
        channels: impl IntoIterator<Item = &'a ChannelName>,
    ) {
        for channel in channels {
            self.unsubscribe(channel, id);
        }
    }

    /// Number of channels with at least one subscriber.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ChannelName, &HashSet<ConnectionId>)> {
        self.channels.iter()
    }
}

/// Authoritative set of live connections.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: HashMap<ConnectionId, Connection>,
    channels: ChannelRegistry,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an authenticated connection and marks it active.
    pub fn admit(&mut self, mut connection: Connection) -> Result<(), RegistryError> {
        let id = connection.id();
        if self.connections.contains_key(&id) {
            return Err(RegistryError::DuplicateId(id));
        }
        connection.activate()?;
        self.connections.insert(id, connection);
        Ok(())
    }

    pub fn get(&self, id: ConnectionId) -> Result<&Connection, RegistryError> {
        self.connections.get(&id).ok_or(RegistryError::NotFound(id))
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.connections.contains_key(&id)
    }

    /// Removes a connection from both indexes and signals its task.
    ///
    /// Idempotent: returns `None` if the connection is already gone.
    pub fn remove(&mut self, id: ConnectionId, reason: CloseReason) -> Option<Connection> {
        let mut connection = self.connections.remove(&id)?;
        self.channels
            .remove_connection(id, connection.subscriptions().iter());
        connection.subscriptions_mut().clear();
        connection.begin_closing(reason);
        connection.finish_closing();
        Some(connection)
    }

    /// Removes every connection, e.g. on shutdown.
    pub fn drain(&mut self, reason: CloseReason) -> Vec<Connection> {
        let ids: Vec<ConnectionId> = self.connections.keys().copied().collect();
        ids.into_iter()
            .filter_map(|id| self.remove(id, reason))
            .collect()
    }

    /// Records a liveness acknowledgment.
    pub fn touch(&mut self, id: ConnectionId, now: Instant) -> Result<(), RegistryError> {
        self.connections
            .get_mut(&id)
            .ok_or(RegistryError::NotFound(id))?
            .touch(now);
        Ok(())
    }

    /// Subscribes `id` to `channel`. Returns false if already subscribed.
    pub fn subscribe(
        &mut self,
        id: ConnectionId,
        channel: &ChannelName,
    ) -> Result<bool, RegistryError> {
        let connection = self
            .connections
            .get_mut(&id)
            .ok_or(RegistryError::NotFound(id))?;
        let added = connection.subscriptions_mut().insert(channel.clone());
        self.channels.subscribe(channel, id);
        Ok(added)
    }

    /// Unsubscribes `id` from `channel`. Returns false if it was not subscribed.
    pub fn unsubscribe(
        &mut self,
        id: ConnectionId,
        channel: &ChannelName,
    ) -> Result<bool, RegistryError> {
        let connection = self
            .connections
            .get_mut(&id)
            .ok_or(RegistryError::NotFound(id))?;
        let removed = connection.subscriptions_mut().remove(channel);
        self.channels.unsubscribe(channel, id);
        Ok(removed)
    }

    pub fn subscribers_of(&self, channel: &ChannelName) -> Vec<ConnectionId> {
        self.channels.subscribers_of(channel)
    }

    /// Outbound queues of every subscriber of `channel`, for fan-out.
    pub fn outbound_for(&self, channel: &ChannelName) -> Vec<(ConnectionId, OutboundSender)> {
        self.channels
            .subscribers_of(channel)
            .into_iter()
            .filter_map(|id| {
                self.connections
                    .get(&id)
                    .map(|connection| (id, connection.outbound().clone()))
            })
            .collect()
    }

    /// Connections with no acknowledgment within `timeout` before `now`.
    pub fn stale(&self, now: Instant, timeout: Duration) -> Vec<ConnectionId> {
        self.connections
            .values()
            .filter(|connection| connection.is_stale(now, timeout))
            .map(Connection::id)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn channel_count(&self) -> usize {
        self.channels.channel_count()
    }

    /// Checks that both indexes describe the same relation.
    pub fn is_consistent(&self) -> bool {
        let forward = self.connections.values().all(|connection| {
            connection
                .subscriptions()
                .iter()
                .all(|channel| self.channels.contains(channel, connection.id()))
        });
        let backward = self.channels.iter().all(|(channel, subscribers)| {
            !subscribers.is_empty()
                && subscribers.iter().all(|id| {
                    self.connections
                        .get(id)
                        .is_some_and(|connection| connection.subscriptions().contains(channel))
                })
        });
        forward && backward
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::websocket::connection::ConnectionInbox;
    use crate::domain::bus::ConnectionState;
    use crate::domain::foundation::{Identity, UserId};
    use proptest::prelude::*;

    fn open(now: Instant) -> (Connection, ConnectionInbox) {
        let identity = Identity::new(UserId::new("user-1").unwrap());
        Connection::open(ConnectionId::new(), identity, 8, now)
    }

    fn channel(name: &str) -> ChannelName {
        ChannelName::parse(name).unwrap()
    }

    // ══════════════════════════════════════════════════════════════
    // ChannelRegistry
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn channel_entry_removed_with_last_subscriber() {
        let mut channels = ChannelRegistry::new();
        let inventory = channel("inventory");
        let id = ConnectionId::new();

        assert!(channels.subscribe(&inventory, id));
        assert!(!channels.subscribe(&inventory, id));
        assert_eq!(channels.channel_count(), 1);

        assert!(channels.unsubscribe(&inventory, id));
        assert_eq!(channels.channel_count(), 0);
        assert!(!channels.unsubscribe(&inventory, id));
    }

    #[test]
    fn unknown_channel_has_no_subscribers() {
        let channels = ChannelRegistry::new();
        assert!(channels.subscribers_of(&channel("nobody")).is_empty());
    }

    // ══════════════════════════════════════════════════════════════
    // ConnectionRegistry
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn admit_marks_active() {
        let mut registry = ConnectionRegistry::new();
        let (conn, _inbox) = open(Instant::now());
        let id = conn.id();

        registry.admit(conn).unwrap();
        assert_eq!(registry.get(id).unwrap().state(), ConnectionState::Active);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn admit_rejects_duplicate_id() {
        let mut registry = ConnectionRegistry::new();
        let now = Instant::now();
        let (first, _a) = open(now);
        let id = first.id();
        let identity = first.identity().clone();
        registry.admit(first).unwrap();

        let (second, _b) = Connection::open(id, identity, 8, now);
        assert_eq!(registry.admit(second), Err(RegistryError::DuplicateId(id)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn subscribe_updates_both_sides() {
        let mut registry = ConnectionRegistry::new();
        let (conn, _inbox) = open(Instant::now());
        let id = conn.id();
        registry.admit(conn).unwrap();

        let inventory = channel("inventory");
        assert_eq!(registry.subscribe(id, &inventory), Ok(true));
        assert_eq!(registry.subscribe(id, &inventory), Ok(false));

        assert_eq!(registry.subscribers_of(&inventory), vec![id]);
        assert!(registry.get(id).unwrap().subscriptions().contains(&inventory));
        assert!(registry.is_consistent());
    }

    #[test]
    fn unsubscribe_of_unknown_channel_is_noop() {
        let mut registry = ConnectionRegistry::new();
        let (conn, _inbox) = open(Instant::now());
        let id = conn.id();
        registry.admit(conn).unwrap();

        assert_eq!(registry.unsubscribe(id, &channel("never")), Ok(false));
        assert!(registry.is_consistent());
    }

    #[test]
    fn subscribe_unknown_connection_fails() {
        let mut registry = ConnectionRegistry::new();
        let id = ConnectionId::new();
        assert_eq!(
            registry.subscribe(id, &channel("inventory")),
            Err(RegistryError::NotFound(id))
        );
    }

    #[tokio::test]
    async fn remove_drains_every_subscription_and_signals() {
        let mut registry = ConnectionRegistry::new();
        let (conn, inbox) = open(Instant::now());
        let id = conn.id();
        registry.admit(conn).unwrap();
        registry.subscribe(id, &channel("inventory")).unwrap();
        registry.subscribe(id, &channel("orders")).unwrap();

        let removed = registry.remove(id, CloseReason::LivenessTimeout).unwrap();

        assert!(removed.subscriptions().is_empty());
        assert_eq!(removed.state(), ConnectionState::Closed);
        assert_eq!(registry.channel_count(), 0);
        assert!(registry.is_empty());
        assert_eq!(inbox.closed.await.unwrap(), CloseReason::LivenessTimeout);
    }

    #[test]
    fn remove_is_idempotent() {
        let mut registry = ConnectionRegistry::new();
        let (conn, _inbox) = open(Instant::now());
        let id = conn.id();
        registry.admit(conn).unwrap();

        assert!(registry.remove(id, CloseReason::ClientClosed).is_some());
        assert!(registry.remove(id, CloseReason::ClientClosed).is_none());
    }

    #[test]
    fn drain_empties_registry() {
        let mut registry = ConnectionRegistry::new();
        let now = Instant::now();
        let mut inboxes = Vec::new();
        for _ in 0..3 {
            let (conn, inbox) = open(now);
            let id = conn.id();
            registry.admit(conn).unwrap();
            registry.subscribe(id, &channel("inventory")).unwrap();
            inboxes.push(inbox);
        }

        let drained = registry.drain(CloseReason::ServerShutdown);
        assert_eq!(drained.len(), 3);
        assert!(registry.is_empty());
        assert_eq!(registry.channel_count(), 0);
    }

    #[test]
    fn stale_lists_only_expired_connections() {
        let mut registry = ConnectionRegistry::new();
        let start = Instant::now();
        let timeout = Duration::from_secs(60);

        let (quiet, _a) = open(start);
        let quiet_id = quiet.id();
        let (chatty, _b) = open(start);
        let chatty_id = chatty.id();
        registry.admit(quiet).unwrap();
        registry.admit(chatty).unwrap();

        registry
            .touch(chatty_id, start + Duration::from_secs(45))
            .unwrap();

        let stale = registry.stale(start + Duration::from_secs(61), timeout);
        assert_eq!(stale, vec![quiet_id]);
    }

    #[test]
    fn outbound_for_pairs_subscribers_with_queues() {
        let mut registry = ConnectionRegistry::new();
        let (conn, _inbox) = open(Instant::now());
        let id = conn.id();
        registry.admit(conn).unwrap();
        registry.subscribe(id, &channel("inventory")).unwrap();

        let targets = registry.outbound_for(&channel("inventory"));
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].0, id);
        assert!(registry.outbound_for(&channel("orders")).is_empty());
    }

    // ══════════════════════════════════════════════════════════════
    // Properties
    // ══════════════════════════════════════════════════════════════

    #[derive(Debug, Clone)]
    enum Op {
        Subscribe(usize, usize),
        Unsubscribe(usize, usize),
        Remove(usize),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0..4usize, 0..3usize).prop_map(|(c, ch)| Op::Subscribe(c, ch)),
            (0..4usize, 0..3usize).prop_map(|(c, ch)| Op::Unsubscribe(c, ch)),
            (0..4usize).prop_map(Op::Remove),
        ]
    }

    proptest! {
        #[test]
        fn indexes_stay_consistent(ops in proptest::collection::vec(op(), 0..64)) {
            let mut registry = ConnectionRegistry::new();
            let now = Instant::now();
            let channels = [channel("inventory"), channel("orders"), channel("pricing")];
            let mut ids = Vec::new();
            let mut inboxes = Vec::new();
            for _ in 0..4 {
                let (conn, inbox) = open(now);
                ids.push(conn.id());
                registry.admit(conn).unwrap();
                inboxes.push(inbox);
            }

            for op in ops {
                match op {
                    Op::Subscribe(c, ch) => { let _ = registry.subscribe(ids[c], &channels[ch]); }
                    Op::Unsubscribe(c, ch) => { let _ = registry.unsubscribe(ids[c], &channels[ch]); }
                    Op::Remove(c) => { registry.remove(ids[c], CloseReason::ClientClosed); }
                }
                prop_assert!(registry.is_consistent());
            }
        }

        #[test]
        fn last_operation_wins(sequence in proptest::collection::vec(any::<bool>(), 1..16)) {
            let mut registry = ConnectionRegistry::new();
            let (conn, _inbox) = open(Instant::now());
            let id = conn.id();
            registry.admit(conn).unwrap();
            let inventory = channel("inventory");

            for &subscribe in &sequence {
                if subscribe {
                    registry.subscribe(id, &inventory).unwrap();
                } else {
                    registry.unsubscribe(id, &inventory).unwrap();
                }
            }

            let expected = *sequence.last().unwrap();
            prop_assert_eq!(registry.subscribers_of(&inventory).contains(&id), expected);
        }
    }
}
