//! Liveness monitor: periodic probes and eviction of silent connections.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::domain::bus::CloseReason;
use crate::domain::foundation::ConnectionId;

use super::broker::Broker;
use super::connection::OutboundFrame;

/// Outcome of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub probed: usize,
    pub evicted: Vec<ConnectionId>,
    pub send_failed: Vec<ConnectionId>,
}

/// The only component that closes connections purely because time passed.
pub struct LivenessMonitor {
    broker: Arc<Broker>,
    interval: Duration,
    timeout: Duration,
}

impl LivenessMonitor {
    pub fn new(broker: Arc<Broker>) -> Self {
        let interval = broker.settings().ping_interval;
        let timeout = broker.settings().pong_timeout;
        Self {
            broker,
            interval,
            timeout,
        }
    }

    /// Evicts connections silent for longer than the timeout and probes the rest.
    pub async fn sweep(&self, now: Instant) -> SweepReport {
        let mut report = SweepReport::default();
        let mut registry = self.broker.registry().await;

        for connection in registry.iter() {
            if connection.is_stale(now, self.timeout) {
                report.evicted.push(connection.id());
            } else if connection.outbound().try_send(OutboundFrame::Ping).is_ok() {
                report.probed += 1;
            } else {
                report.send_failed.push(connection.id());
            }
        }

        for &id in &report.evicted {
            if let Some(connection) = registry.remove(id, CloseReason::LivenessTimeout) {
                tracing::info!(
                    connection_id = %id,
                    user_id = %connection.identity().user_id,
                    silent_for_ms = now.saturating_duration_since(connection.last_pong_at()).as_millis() as u64,
                    "Connection evicted: liveness timeout"
                );
            }
        }
        for &id in &report.send_failed {
            if registry.remove(id, CloseReason::SendFailed).is_some() {
                tracing::warn!(connection_id = %id, "Liveness probe could not be queued");
            }
        }

        tracing::trace!(
            probed = report.probed,
            evicted = report.evicted.len(),
            connections = registry.len(),
            "Liveness sweep"
        );
        report
    }

    /// Sweeps on every interval tick until shutdown.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; skip it so fresh connections get a full interval.
        interval.tick().await;

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::debug!("Liveness monitor stopping");
                        return;
                    }
                }

                _ = interval.tick() => {
                    self.sweep(Instant::now()).await;
                }
            }
        }
    }
}
