//! Transport abstraction over the status WebSocket.
//!
//! The connection task only ever talks to the [`Connector`] /
//! [`TransportSink`] / [`TransportSource`] traits, so tests can swap the
//! real socket for a scripted fake. [`WsConnector`] is the production
//! implementation over `tokio-tungstenite`.

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use crate::errors::{Result, SyncError};

/// Something observed on the inbound half of the transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportEvent {
    /// A UTF-8 text frame.
    Text(String),
    /// The peer closed the stream, with an optional reason.
    Closed(Option<String>),
}

/// Outbound half of an open transport.
#[async_trait]
pub trait TransportSink: Send {
    /// Write one text frame.
    async fn send_text(&mut self, text: String) -> Result<()>;
    /// Close the stream deliberately.
    async fn close(&mut self) -> Result<()>;
}

/// Inbound half of an open transport.
#[async_trait]
pub trait TransportSource: Send {
    /// Next inbound event; `None` once the stream has ended.
    async fn next_event(&mut self) -> Option<TransportEvent>;
}

/// Opens transport sessions. One [`Connector`] may be asked to open many
/// times over the life of a connection (once per reconnect attempt).
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a new session, yielding its two halves.
    async fn open(&self) -> Result<(Box<dyn TransportSink>, Box<dyn TransportSource>)>;
}

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Production connector over `tokio-tungstenite`.
pub struct WsConnector {
    url: String,
}

impl WsConnector {
    /// Create a connector for the given `ws://` / `wss://` URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn open(&self) -> Result<(Box<dyn TransportSink>, Box<dyn TransportSource>)> {
        let (stream, _response) = connect_async(&self.url)
            .await
            .map_err(|e| SyncError::Connect(e.to_string()))?;
        let (sink, source) = stream.split();
        Ok((Box::new(WsSink { inner: sink }), Box::new(WsSource { inner: source })))
    }
}

struct WsSink {
    inner: SplitSink<WsStream, Message>,
}

#[async_trait]
impl TransportSink for WsSink {
    async fn send_text(&mut self, text: String) -> Result<()> {
        self.inner
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| SyncError::Transport(e.to_string()))
    }

    async fn close(&mut self) -> Result<()> {
        self.inner
            .close()
            .await
            .map_err(|e| SyncError::Transport(e.to_string()))
    }
}

struct WsSource {
    inner: SplitStream<WsStream>,
}

#[async_trait]
impl TransportSource for WsSource {
    async fn next_event(&mut self) -> Option<TransportEvent> {
        loop {
            return match self.inner.next().await? {
                Ok(Message::Text(text)) => Some(TransportEvent::Text(text.as_str().to_owned())),
                Ok(Message::Close(frame)) => Some(TransportEvent::Closed(
                    frame.map(|f| f.reason.as_str().to_owned()),
                )),
                // Tungstenite answers pings itself; binary frames are not
                // part of the status protocol.
                Ok(_) => continue,
                Err(e) => Some(TransportEvent::Closed(Some(e.to_string()))),
            };
        }
    }
}
