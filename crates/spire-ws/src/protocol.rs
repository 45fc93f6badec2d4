//! The WebSocket namespace protocol.
//!
//! All messages are JSON text frames, camelCase, tagged by `type`.

use serde::{Deserialize, Serialize};
use spire_stream::Frame;

/// A message from the client.
///
/// ```json
/// {"type":"start","requestId":"r1","route":"/hello/stream","method":"POST","input":{}}
/// {"type":"cancel","requestId":"r1"}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Starts a stream under a client-chosen `requestId`.
    #[serde(rename_all = "camelCase")]
    Start {
        /// Client-chosen id tagging every message of this stream.
        request_id: String,
        /// The registered route to invoke.
        route: String,
        /// The registered HTTP method, case-insensitive.
        method: String,
        /// The operation's request body.
        #[serde(default)]
        input: serde_json::Value,
    },
    /// Cancels the stream registered under `requestId`.
    #[serde(rename_all = "camelCase")]
    Cancel {
        /// The id passed to the matching `start`.
        request_id: String,
    },
}

/// A message to the client.
///
/// Data frames arrive as `frame` messages; each stream ends with exactly one
/// of `end`, `error`, or `cancelled`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    /// A data frame produced by the stream.
    #[serde(rename_all = "camelCase")]
    Frame {
        /// The id of the stream this frame belongs to.
        request_id: String,
        /// The data frame.
        frame: Frame,
    },
    /// The stream completed normally.
    #[serde(rename_all = "camelCase")]
    End {
        /// The id of the completed stream.
        request_id: String,
    },
    /// The stream (or the `start` itself) failed.
    #[serde(rename_all = "camelCase")]
    Error {
        /// The id of the failed stream; empty when the client message could
        /// not be parsed at all.
        request_id: String,
        /// Client-safe error message.
        message: String,
    },
    /// The stream was cancelled by the client.
    #[serde(rename_all = "camelCase")]
    Cancelled {
        /// The id of the cancelled stream.
        request_id: String,
    },
}

impl ServerMessage {
    /// Wraps a dispatch frame for the stream tagged `request_id`.
    ///
    /// Terminal frames map to their dedicated message types so clients can
    /// close out a stream without inspecting frame payloads.
    #[must_use]
    pub fn from_frame(request_id: impl Into<String>, frame: Frame) -> Self {
        let request_id = request_id.into();
        match frame {
            Frame::End => Self::End { request_id },
            Frame::Error { message } => Self::Error {
                request_id,
                message,
            },
            Frame::Cancelled => Self::Cancelled { request_id },
            data => Self::Frame {
                request_id,
                frame: data,
            },
        }
    }

    /// Returns the `requestId` this message is tagged with.
    #[must_use]
    pub fn request_id(&self) -> &str {
        match self {
            Self::Frame { request_id, .. }
            | Self::End { request_id }
            | Self::Error { request_id, .. }
            | Self::Cancelled { request_id } => request_id,
        }
    }
}
