//! WebSocket broker: connection lifecycle, subscriptions and event fan-out.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                 Producers (inventory / order services)               │
//! └─────────────────────────────────────────────────────────────────────┘
//!                                     │ publish
//!                                     ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  BusPublisher ──► publish queue ──► MessageRouter (fan-out task)     │
//! └─────────────────────────────────────────────────────────────────────┘
//!                                     │ snapshot subscribers
//!                                     ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  Broker: ConnectionRegistry + ChannelRegistry behind one mutex       │
//! │  inventory → { conn-a, conn-b }      orders → { conn-a }             │
//! └─────────────────────────────────────────────────────────────────────┘
//!            │ outbound queues                      ▲ evictions
//!            ▼                                      │
//! ┌──────────────────────────────┐   ┌──────────────────────────────────┐
//! │ connection tasks (handler)   │   │ LivenessMonitor (probe / evict)  │
//! └──────────────────────────────┘   └──────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`messages`] - Wire protocol types
//! - [`connection`] - Per-connection record and queues
//! - [`registry`] - Connection and channel registries
//! - [`broker`] - Shared state, admission, removal, shutdown
//! - [`router`] - Inbound frame routing and outbound fan-out
//! - [`liveness`] - Ping/timeout sweeps
//! - [`publisher`] - `EventPublisher` implementation
//! - [`bus`] - Wiring of the above into running tasks
//! - [`handler`] - Axum WebSocket upgrade handler

pub mod broker;
pub mod bus;
pub mod connection;
pub mod handler;
pub mod liveness;
pub mod messages;
pub mod publisher;
pub mod registry;
pub mod router;

pub use broker::{Broker, BrokerSettings, BrokerStats, SubscribeOutcome};
pub use bus::EventBus;
pub use connection::{Connection, ConnectionInbox, OutboundFrame, OutboundSender};
pub use handler::{websocket_router, ws_handler, ConnectParams, WebSocketState};
pub use liveness::{LivenessMonitor, SweepReport};
pub use messages::{ChannelField, ClientMessage, ServerMessage};
pub use publisher::BusPublisher;
pub use registry::{ChannelRegistry, ConnectionRegistry};
pub use router::{FanOutReport, FrameGuard, InboundAction, MessageRouter};
