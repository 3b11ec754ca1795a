//! Sync layer error types.

use thiserror::Error;

/// Errors produced by the sync layer.
///
/// Note that most transport failures never surface through `Result` at all:
/// the connection task converts them into state transitions and inbound
/// `error` messages (see `connection`). These variants cover the places
/// where a caller is awaiting a concrete operation, such as opening a
/// socket or pulling from the REST backend.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The WebSocket handshake failed.
    #[error("failed to open status socket: {0}")]
    Connect(String),
    /// The socket dropped or refused a write.
    #[error("transport failure: {0}")]
    Transport(String),
    /// The REST backend returned an error or unreadable body.
    #[error("active-records fetch failed: {0}")]
    Http(#[from] reqwest::Error),
    /// A message could not be serialized for the wire.
    #[error("failed to serialize message: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
