//! Connection manager: owns the one status socket for the process.
//!
//! A background task holds the transport; the public [`ConnectionHandle`]
//! talks to it over a command channel. All socket and reconnect-timer state
//! lives inside that single task, so nothing here needs a lock and the
//! ordering of inbound frames is exactly the transport's.
//!
//! Reconnect policy: an unexpected close or failed open records the cause,
//! publishes `Errored`, and schedules exactly one retry after a capped,
//! jittered exponential delay. A deliberate [`ConnectionHandle::disconnect`]
//! cancels any pending retry; dropping the handle tears the task down and
//! the timer with it.

use std::sync::Arc;
use std::time::Duration;

use campus_core::ReconnectConfig;
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use crate::transport::{Connector, TransportEvent, TransportSink, TransportSource};

/// Connection lifecycle state, observable through [`ConnectionHandle::status`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectionState {
    /// No socket, none wanted (initial, or after a deliberate disconnect).
    #[default]
    Disconnected,
    /// A handshake is in progress.
    Connecting,
    /// The socket is open.
    Connected,
    /// The socket failed; a reconnect is pending.
    Errored,
}

/// State plus the most recent failure cause, published on a watch channel.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConnectionStatus {
    /// Current lifecycle state.
    pub state: ConnectionState,
    /// Human-readable cause of the last failure, if any.
    pub error: Option<String>,
}

/// Raw inbound traffic handed to the broadcaster.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Inbound {
    /// A text frame straight off the transport.
    Frame(String),
    /// A transport-level failure, routed like any other inbound message.
    TransportError(String),
}

enum Command {
    Connect,
    Disconnect,
    Send(String),
}

/// Handle to the connection task.
///
/// Cloneable; dropping the last clone shuts the task down, cancelling any
/// pending reconnect.
#[derive(Clone)]
pub struct ConnectionHandle {
    cmd_tx: mpsc::Sender<Command>,
    status_rx: watch::Receiver<ConnectionStatus>,
}

impl ConnectionHandle {
    /// Spawn the connection task.
    ///
    /// Returns the handle and the inbound channel the broadcaster drains.
    /// The task starts in `Disconnected`; call [`connect`](Self::connect)
    /// to open the socket.
    pub(crate) fn spawn(
        connector: Arc<dyn Connector>,
        reconnect: ReconnectConfig,
        queue_size: usize,
    ) -> (Self, mpsc::UnboundedReceiver<Inbound>) {
        let (cmd_tx, cmd_rx) = mpsc::channel(queue_size.max(1));
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::default());

        let task = ConnectionTask {
            connector,
            reconnect,
            cmd_rx,
            inbound_tx,
            status_tx,
            failures: 0,
        };
        drop(tokio::spawn(task.run()));

        (Self { cmd_tx, status_rx }, inbound_rx)
    }

    /// Ask the task to open the socket.
    ///
    /// Idempotent: while already connecting or connected this is a no-op,
    /// and during a backoff wait it short-circuits the timer.
    pub fn connect(&self) {
        let _ = self.cmd_tx.try_send(Command::Connect);
    }

    /// Close the socket deliberately and cancel any pending reconnect.
    pub fn disconnect(&self) {
        let _ = self.cmd_tx.try_send(Command::Disconnect);
    }

    /// Send one already-serialized frame, best effort.
    ///
    /// A no-op unless currently connected; the sync layer makes no delivery
    /// guarantee and callers get no error back.
    pub fn send(&self, frame: String) {
        if self.state() != ConnectionState::Connected {
            debug!("dropping outbound frame, not connected");
            return;
        }
        let _ = self.cmd_tx.try_send(Command::Send(frame));
    }

    /// Watch channel with the current [`ConnectionStatus`].
    pub fn status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_rx.clone()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.status_rx.borrow().state
    }

    /// Whether the socket is open.
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Whether a handshake is in progress.
    pub fn is_connecting(&self) -> bool {
        self.state() == ConnectionState::Connecting
    }

    /// Cause of the most recent failure, if any.
    pub fn last_error(&self) -> Option<String> {
        self.status_rx.borrow().error.clone()
    }
}

// ── Connection task ─────────────────────────────────────────────────────────

enum Phase {
    /// No socket, no retry pending.
    Idle,
    /// Socket open.
    Online {
        sink: Box<dyn TransportSink>,
        source: Box<dyn TransportSource>,
    },
    /// Waiting out the backoff delay before the next open.
    Backoff,
}

enum OnlineStep {
    Cmd(Option<Command>),
    Event(Option<TransportEvent>),
}

enum BackoffStep {
    Timer,
    Cmd(Option<Command>),
}

struct ConnectionTask {
    connector: Arc<dyn Connector>,
    reconnect: ReconnectConfig,
    cmd_rx: mpsc::Receiver<Command>,
    inbound_tx: mpsc::UnboundedSender<Inbound>,
    status_tx: watch::Sender<ConnectionStatus>,
    /// Consecutive failed opens; resets on success.
    failures: u32,
}

impl ConnectionTask {
    async fn run(mut self) {
        let mut phase = Phase::Idle;
        loop {
            phase = match phase {
                Phase::Idle => match self.cmd_rx.recv().await {
                    None => break,
                    Some(Command::Connect) => self.try_open().await,
                    // Nothing to close, nothing to send it on.
                    Some(Command::Disconnect | Command::Send(_)) => Phase::Idle,
                },
                Phase::Online { mut sink, mut source } => {
                    let step = tokio::select! {
                        cmd = self.cmd_rx.recv() => OnlineStep::Cmd(cmd),
                        event = source.next_event() => OnlineStep::Event(event),
                    };
                    match step {
                        OnlineStep::Cmd(None) => {
                            let _ = sink.close().await;
                            break;
                        }
                        // Already connected: connect() is idempotent.
                        OnlineStep::Cmd(Some(Command::Connect)) => Phase::Online { sink, source },
                        OnlineStep::Cmd(Some(Command::Disconnect)) => {
                            let _ = sink.close().await;
                            self.failures = 0;
                            self.set_status(ConnectionState::Disconnected, None);
                            debug!("disconnected on request");
                            Phase::Idle
                        }
                        OnlineStep::Cmd(Some(Command::Send(frame))) => {
                            match sink.send_text(frame).await {
                                Ok(()) => Phase::Online { sink, source },
                                Err(e) => self.on_transport_failure(e.to_string()),
                            }
                        }
                        OnlineStep::Event(Some(TransportEvent::Text(text))) => {
                            let _ = self.inbound_tx.send(Inbound::Frame(text));
                            Phase::Online { sink, source }
                        }
                        OnlineStep::Event(Some(TransportEvent::Closed(reason))) => self
                            .on_transport_failure(
                                reason.unwrap_or_else(|| "connection closed by server".into()),
                            ),
                        OnlineStep::Event(None) => {
                            self.on_transport_failure("connection closed by server".into())
                        }
                    }
                }
                Phase::Backoff => {
                    let attempt = self.failures.saturating_sub(1);
                    let delay = self.reconnect.delay_ms(attempt, rand::random::<f64>());
                    debug!(attempt, delay_ms = delay, "reconnect scheduled");
                    let timer = tokio::time::sleep(Duration::from_millis(delay));
                    tokio::pin!(timer);

                    let next = loop {
                        let step = tokio::select! {
                            () = &mut timer => BackoffStep::Timer,
                            cmd = self.cmd_rx.recv() => BackoffStep::Cmd(cmd),
                        };
                        match step {
                            BackoffStep::Timer => break Some(self.try_open().await),
                            // Handle dropped: the pending retry dies here.
                            BackoffStep::Cmd(None) => break None,
                            BackoffStep::Cmd(Some(Command::Disconnect)) => {
                                self.failures = 0;
                                self.set_status(ConnectionState::Disconnected, None);
                                debug!("pending reconnect cancelled");
                                break Some(Phase::Idle);
                            }
                            // Manual retry skips the rest of the wait.
                            BackoffStep::Cmd(Some(Command::Connect)) => {
                                break Some(self.try_open().await);
                            }
                            // Best-effort channel: dropped while offline.
                            BackoffStep::Cmd(Some(Command::Send(_))) => {}
                        }
                    };
                    match next {
                        Some(phase) => phase,
                        None => break,
                    }
                }
            };
        }
    }

    async fn try_open(&mut self) -> Phase {
        self.set_status(ConnectionState::Connecting, None);
        match self.connector.open().await {
            Ok((sink, source)) => {
                self.failures = 0;
                self.set_status(ConnectionState::Connected, None);
                debug!("status socket connected");
                Phase::Online { sink, source }
            }
            Err(e) => {
                let cause = e.to_string();
                warn!(error = %cause, "status socket open failed");
                self.failures = self.failures.saturating_add(1);
                self.set_status(ConnectionState::Errored, Some(cause.clone()));
                let _ = self.inbound_tx.send(Inbound::TransportError(cause));
                Phase::Backoff
            }
        }
    }

    /// Unexpected failure of an established socket: record, route, back off.
    fn on_transport_failure(&mut self, cause: String) -> Phase {
        warn!(error = %cause, "status socket lost");
        self.set_status(ConnectionState::Errored, Some(cause.clone()));
        let _ = self.inbound_tx.send(Inbound::TransportError(cause));
        Phase::Backoff
    }

    fn set_status(&self, state: ConnectionState, error: Option<String>) {
        let _ = self.status_tx.send(ConnectionStatus { state, error });
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
