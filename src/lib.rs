//! Inventory Event Bus - real-time notification layer for inventory and order events.
//!
//! Browser clients connect over WebSocket with a bearer token, subscribe to
//! channels such as `inventory` or `orders`, and receive every event that
//! producers publish on those channels while they stay connected.

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
