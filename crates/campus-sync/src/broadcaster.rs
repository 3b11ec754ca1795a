//! Fan-out of inbound status messages to subscribers.
//!
//! One [`Broadcaster`] lives for the whole process and is the only surface
//! the rest of the application touches: features subscribe to it, send
//! through it, and read connection state from it. It wraps the connection
//! task and parses frames at this boundary, so subscribers only ever see
//! well-formed [`SyncMessage`]s.

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Weak};

use campus_core::{ReconnectConfig, SyncMessage, parse_frame};
use campus_settings::SyncSettings;
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use crate::connection::{ConnectionHandle, ConnectionStatus, Inbound};
use crate::transport::{Connector, WsConnector};

type Callback = Arc<dyn Fn(&SyncMessage) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    /// Kept in registration order; dispatch walks this front to back.
    entries: Vec<(u64, Callback)>,
}

/// Capability to undo a [`Broadcaster::subscribe`] call.
///
/// Unsubscribes on drop, so a consumer that holds its subscription as a
/// field stops receiving messages the moment it is dropped. Dropping after
/// the broadcaster is gone is a no-op.
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    /// Unsubscribe explicitly (equivalent to dropping the token).
    pub fn cancel(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.lock().entries.retain(|(id, _)| *id != self.id);
        }
    }
}

/// The process-wide message hub.
///
/// Construct one per process (via [`start`](Self::start) in production or
/// [`with_connector`](Self::with_connector) in tests) and hand clones to
/// whatever needs live data; clones share the same connection and registry.
#[derive(Clone)]
pub struct Broadcaster {
    connection: ConnectionHandle,
    registry: Arc<Mutex<Registry>>,
}

impl Broadcaster {
    /// Start the broadcaster against the configured status endpoint and
    /// begin connecting immediately.
    pub fn start(settings: &SyncSettings) -> Self {
        let connector = Arc::new(WsConnector::new(settings.ws_url()));
        Self::with_connector(connector, settings.reconnect.clone(), settings.send_queue_size)
    }

    /// Start the broadcaster over an arbitrary [`Connector`].
    pub fn with_connector(
        connector: Arc<dyn Connector>,
        reconnect: ReconnectConfig,
        queue_size: usize,
    ) -> Self {
        let (connection, inbound_rx) = ConnectionHandle::spawn(connector, reconnect, queue_size);
        let registry = Arc::new(Mutex::new(Registry::default()));
        drop(tokio::spawn(dispatch_loop(inbound_rx, Arc::clone(&registry))));
        connection.connect();
        Self { connection, registry }
    }

    /// Register a callback for every inbound message.
    ///
    /// Callbacks run on the dispatch task, in registration order, for every
    /// parsed message; filter by [`SyncMessage`] variant inside the
    /// callback. The returned token unsubscribes when dropped.
    pub fn subscribe(&self, callback: impl Fn(&SyncMessage) + Send + Sync + 'static) -> Subscription {
        let mut registry = self.registry.lock();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.entries.push((id, Arc::new(callback)));
        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Serialize `message` and send it out, best effort.
    ///
    /// All consumers share this one outbound channel; while disconnected
    /// the message is silently dropped.
    pub fn send(&self, message: &SyncMessage) {
        match message.to_frame() {
            Ok(frame) => self.connection.send(frame),
            Err(e) => warn!(kind = message.kind(), error = %e, "failed to serialize outbound message"),
        }
    }

    /// Ask the connection to (re)connect. Idempotent.
    pub fn reconnect(&self) {
        self.connection.connect();
    }

    /// Close the connection deliberately, cancelling any pending reconnect.
    pub fn disconnect(&self) {
        self.connection.disconnect();
    }

    /// Whether the status socket is open.
    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    /// Whether a handshake is in progress.
    pub fn is_connecting(&self) -> bool {
        self.connection.is_connecting()
    }

    /// Cause of the most recent connection failure, if any.
    pub fn last_error(&self) -> Option<String> {
        self.connection.last_error()
    }

    /// Watch channel with the current connection status.
    pub fn status(&self) -> watch::Receiver<ConnectionStatus> {
        self.connection.status()
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.registry.lock().entries.len()
    }
}

/// Drains the inbound channel until the connection task goes away.
async fn dispatch_loop(mut inbound: mpsc::UnboundedReceiver<Inbound>, registry: Arc<Mutex<Registry>>) {
    while let Some(item) = inbound.recv().await {
        let message = match item {
            Inbound::Frame(text) => match parse_frame(&text) {
                Ok(Some(message)) => message,
                Ok(None) => {
                    debug!(frame = %text, "ignoring unrecognized message kind");
                    continue;
                }
                Err(e) => {
                    warn!(error = %e, "dropping malformed frame");
                    continue;
                }
            },
            Inbound::TransportError(message) => SyncMessage::Error { message },
        };
        dispatch(&registry, &message);
    }
    debug!("inbound channel closed, dispatch loop exiting");
}

/// Invoke the current snapshot of subscribers, in registration order.
///
/// The lock is released before any callback runs, so callbacks are free to
/// subscribe or unsubscribe reentrantly. A panicking callback is logged and
/// skipped; the rest still run.
fn dispatch(registry: &Mutex<Registry>, message: &SyncMessage) {
    let snapshot: Vec<Callback> = registry
        .lock()
        .entries
        .iter()
        .map(|(_, callback)| Arc::clone(callback))
        .collect();
    debug!(kind = message.kind(), subscribers = snapshot.len(), "dispatching message");
    for callback in snapshot {
        if std::panic::catch_unwind(AssertUnwindSafe(|| callback(message))).is_err() {
            warn!(kind = message.kind(), "subscriber panicked, continuing dispatch");
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
