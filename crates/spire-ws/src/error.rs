//! Error types for the WebSocket transport.

use thiserror::Error;

/// Result type alias using [`WsError`].
pub type WsResult<T> = Result<T, WsError>;

/// Errors raised while driving a WebSocket session.
#[derive(Debug, Error)]
pub enum WsError {
    /// The underlying socket failed.
    #[error("WebSocket transport error: {0}")]
    Transport(#[from] tungstenite::Error),

    /// An outgoing message could not be serialized.
    #[error("Failed to encode server message: {0}")]
    Encode(#[from] serde_json::Error),
}
