//! # campus-sync
//!
//! Real-time status synchronization for the Campus client.
//!
//! Layered from the wire up:
//!
//! - **Transport**: `Connector` / `TransportSink` / `TransportSource` traits over
//!   `tokio-tungstenite`, so everything above is testable without a network
//! - **Connection**: one owned `WebSocket` with auto-reconnect and jittered
//!   exponential backoff, driven by an actor task behind a cloneable handle
//! - **Broadcaster**: fans every parsed [`SyncMessage`](campus_core::SyncMessage)
//!   out to dynamic subscribers; subscriptions are RAII tokens
//! - **Data source**: `ActivityStore` trait with a `reqwest` REST implementation
//!   for pulling the authoritative active-activity list
//! - **Consumer**: [`ActivityFeed`], which refetches on relevant pushes and
//!   coalesces bursts into a single request

#![deny(unsafe_code)]

pub mod broadcaster;
pub mod connection;
pub mod consumer;
pub mod datasource;
pub mod errors;
pub mod transport;

#[cfg(test)]
pub(crate) mod testutil;

pub use broadcaster::{Broadcaster, Subscription};
pub use connection::{ConnectionHandle, ConnectionState, ConnectionStatus};
pub use consumer::ActivityFeed;
pub use datasource::{ActivityStore, RestActivityStore};
pub use errors::{Result, SyncError};
pub use transport::{Connector, TransportEvent, TransportSink, TransportSource, WsConnector};
