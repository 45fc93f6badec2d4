//! # Spire Stream
//!
//! Streaming primitives for the Spire dispatch framework:
//!
//! - [`Frame`] - One incremental unit of streaming output
//! - [`NdjsonEncoder`] / [`SseEncoder`] - Wire encodings for HTTP streaming
//! - [`CancelRegistry`] - Concurrent map of in-flight streams by request ID
//! - [`CancelToken`] / [`CancelHandle`] - Cooperative cancellation pair
//! - [`StreamOperation`] - The streaming operation contract

#![doc(html_root_url = "https://docs.rs/spire-stream/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod cancel;
mod error;
mod frame;
mod operation;

pub use cancel::{cancel_pair, CancelHandle, CancelRegistry, CancelToken};
pub use error::{StreamError, StreamResult};
pub use frame::{Frame, NdjsonEncoder, SseEncoder};
pub use operation::{StreamOperation, ValueStream};
