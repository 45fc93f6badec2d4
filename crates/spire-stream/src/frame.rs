//! Stream frame types and wire encodings.
//!
//! A [`Frame`] is one incremental unit of streaming output. Exactly one
//! terminal frame ([`End`](Frame::End), [`Error`](Frame::Error), or
//! [`Cancelled`](Frame::Cancelled)) closes every stream, on every path.
//!
//! Two HTTP wire encodings are provided: newline-delimited JSON
//! ([`NdjsonEncoder`]) and Server-Sent Events ([`SseEncoder`]). The
//! WebSocket transport wraps frames in its own message envelope instead.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::StreamResult;

/// One incremental unit of streaming output.
///
/// Frames serialize as camelCase JSON tagged by `type`:
///
/// ```json
/// {"type":"data","data":{"char":"H"}}
/// {"type":"end"}
/// {"type":"error","message":"stream failed"}
/// {"type":"cancelled"}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Frame {
    /// A data payload produced by the operation.
    Data {
        /// The payload.
        data: serde_json::Value,
    },
    /// Normal completion; no further frames follow.
    End,
    /// Abnormal completion with a client-safe message; no further frames
    /// follow.
    Error {
        /// Client-safe error message.
        message: String,
    },
    /// The stream was cancelled by the caller; no further frames follow.
    Cancelled,
}

impl Frame {
    /// Creates a data frame.
    #[must_use]
    pub const fn data(data: serde_json::Value) -> Self {
        Self::Data { data }
    }

    /// Creates a data frame from a serializable value.
    pub fn json<T: Serialize>(value: &T) -> StreamResult<Self> {
        Ok(Self::Data {
            data: serde_json::to_value(value)?,
        })
    }

    /// Creates an error frame.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Returns `true` for frames that close the stream.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::End | Self::Error { .. } | Self::Cancelled)
    }

    /// Returns the frame's `type` tag as it appears on the wire.
    #[must_use]
    pub const fn type_tag(&self) -> &'static str {
        match self {
            Self::Data { .. } => "data",
            Self::End => "end",
            Self::Error { .. } => "error",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Newline-delimited JSON encoding: one frame object per line.
#[derive(Debug, Clone, Copy, Default)]
pub struct NdjsonEncoder;

impl NdjsonEncoder {
    /// The content type for NDJSON responses.
    pub const CONTENT_TYPE: &'static str = "application/x-ndjson";

    /// Encodes a frame as one JSON object followed by a newline.
    pub fn encode(frame: &Frame) -> StreamResult<Bytes> {
        let mut buf = serde_json::to_vec(frame)?;
        buf.push(b'\n');
        Ok(Bytes::from(buf))
    }
}

/// Server-Sent Events encoding.
///
/// Data frames become plain `data:` blocks; terminal frames additionally
/// carry an `event:` line naming the frame type so clients can close the
/// EventSource without parsing the payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct SseEncoder;

impl SseEncoder {
    /// The content type for SSE responses.
    pub const CONTENT_TYPE: &'static str = "text/event-stream";

    /// Encodes a frame as an SSE text block.
    pub fn encode(frame: &Frame) -> StreamResult<Bytes> {
        let json = serde_json::to_string(frame)?;
        let mut block = String::new();
        if frame.is_terminal() {
            block.push_str("event: ");
            block.push_str(frame.type_tag());
            block.push('\n');
        }
        block.push_str("data: ");
        block.push_str(&json);
        block.push_str("\n\n");
        Ok(Bytes::from(block))
    }

    /// Encodes a keepalive comment line.
    #[must_use]
    pub fn keepalive() -> Bytes {
        Bytes::from_static(b": keepalive\n\n")
    }
}
