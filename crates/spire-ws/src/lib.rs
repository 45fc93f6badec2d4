//! # Spire WebSocket
//!
//! The WebSocket transport for streaming operations.
//!
//! One socket carries any number of concurrent streams, each tagged by a
//! client-supplied `requestId`. Clients send [`ClientMessage`]s (`start` and
//! `cancel`); the session answers with [`ServerMessage`]s that wrap the
//! dispatch layer's frames. Duplicate `start`s for a live `requestId` are
//! rejected with an `error` message while the original stream keeps running.
//!
//! The HTTP upgrade handshake itself lives in the server crate; this crate
//! drives an already-upgraded socket.

#![doc(html_root_url = "https://docs.rs/spire-ws/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod protocol;
mod session;
mod socket;

pub use error::{WsError, WsResult};
pub use protocol::{ClientMessage, ServerMessage};
pub use session::Session;
pub use socket::drive_socket;
