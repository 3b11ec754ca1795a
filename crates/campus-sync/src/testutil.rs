//! Scripted transport fakes shared by the unit tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{Notify, mpsc};

use crate::errors::{Result, SyncError};
use crate::transport::{Connector, TransportEvent, TransportSink, TransportSource};

/// Scripted transport: the test plays the server side.
pub(crate) struct FakeConnector {
    opens: AtomicUsize,
    /// Fail this many opens before succeeding.
    fail_opens: AtomicUsize,
    /// When set, `open` waits for a permit before returning.
    hold: Option<Arc<Notify>>,
    /// Server-side sender for the most recent session.
    server: Mutex<Option<mpsc::UnboundedSender<TransportEvent>>>,
    /// Everything the client wrote, across all sessions.
    pub(crate) sent: Arc<Mutex<Vec<String>>>,
}

impl FakeConnector {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            opens: AtomicUsize::new(0),
            fail_opens: AtomicUsize::new(0),
            hold: None,
            server: Mutex::new(None),
            sent: Arc::new(Mutex::new(Vec::new())),
        })
    }

    pub(crate) fn failing_first(n: usize) -> Arc<Self> {
        let conn = Self::new();
        conn.fail_opens.store(n, Ordering::SeqCst);
        conn
    }

    pub(crate) fn held(gate: Arc<Notify>) -> Arc<Self> {
        Arc::new(Self {
            opens: AtomicUsize::new(0),
            fail_opens: AtomicUsize::new(0),
            hold: Some(gate),
            server: Mutex::new(None),
            sent: Arc::new(Mutex::new(Vec::new())),
        })
    }

    pub(crate) fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Push an event from the "server" into the current session.
    pub(crate) fn push(&self, event: TransportEvent) {
        let guard = self.server.lock();
        let tx = guard.as_ref().expect("no open session");
        tx.send(event).expect("session receiver dropped");
    }

    /// Push a text frame from the "server".
    pub(crate) fn push_text(&self, text: impl Into<String>) {
        self.push(TransportEvent::Text(text.into()));
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn open(&self) -> Result<(Box<dyn TransportSink>, Box<dyn TransportSource>)> {
        if let Some(gate) = &self.hold {
            gate.notified().await;
        }
        let _ = self.opens.fetch_add(1, Ordering::SeqCst);
        if self
            .fail_opens
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(SyncError::Connect("connection refused".into()));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        *self.server.lock() = Some(tx);
        Ok((
            Box::new(FakeSink { sent: Arc::clone(&self.sent) }),
            Box::new(FakeSource { rx }),
        ))
    }
}

struct FakeSink {
    sent: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl TransportSink for FakeSink {
    async fn send_text(&mut self, text: String) -> Result<()> {
        self.sent.lock().push(text);
        Ok(())
    }
    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

struct FakeSource {
    rx: mpsc::UnboundedReceiver<TransportEvent>,
}

#[async_trait]
impl TransportSource for FakeSource {
    async fn next_event(&mut self) -> Option<TransportEvent> {
        self.rx.recv().await
    }
}

/// Let spawned tasks run (the paused clock makes this deterministic).
pub(crate) async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}
