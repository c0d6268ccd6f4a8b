//! Error types for subscription sessions

use std::time::Duration;
use thiserror::Error;
use tokio_tungstenite::tungstenite;

use crate::session::SessionState;

/// Result type for session operations
pub type StreamResult<T> = Result<T, StreamError>;

/// Errors that end or prevent a subscription session
#[derive(Debug, Error)]
pub enum StreamError {
    /// The WebSocket handshake failed
    #[error("failed to connect to {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: tungstenite::Error,
    },

    /// The WebSocket handshake did not finish in time
    #[error("connecting to {url} timed out after {timeout:?}")]
    ConnectTimeout { url: String, timeout: Duration },

    /// An operation that needs an open session was attempted in another state
    #[error("session is {state}, not open")]
    NotOpen { state: SessionState },

    /// Writing a frame to the transport failed
    #[error("failed to send frame: {0}")]
    Send(#[source] tungstenite::Error),

    /// A command could not be serialized
    #[error("failed to encode command: {0}")]
    Encode(#[from] serde_json::Error),

    /// The connection ended without `close` being called
    #[error("connection to {url} dropped: {reason}")]
    Disconnected { url: String, reason: String },

    /// The receiver task did not stop within the join timeout and was aborted
    #[error("receiver task did not stop within {timeout:?}")]
    ReceiverLeaked { timeout: Duration },

    /// The receiver task panicked
    #[error("receiver task failed: {0}")]
    ReceiverFailed(String),
}
