//! Error types for streaming.

use thiserror::Error;

/// Result type alias using [`StreamError`].
pub type StreamResult<T> = Result<T, StreamError>;

/// Errors that can occur while encoding or driving streams.
#[derive(Debug, Error)]
pub enum StreamError {
    /// Frame serialization failed.
    #[error("Frame serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The receiving side of a stream channel is gone.
    #[error("Stream channel closed")]
    ChannelClosed,
}
