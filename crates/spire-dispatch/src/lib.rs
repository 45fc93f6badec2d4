//! # Spire Dispatch
//!
//! The per-call middleware for the Spire dispatch framework.
//!
//! A [`Dispatcher`] resolves the caller from the `Authorization` header,
//! enforces the route's authentication policy, logs operation start and
//! completion, drives the operation lifecycle through the registry's
//! type-erased entry, and converts failures into client-safe error
//! envelopes. The streaming path additionally manages the cancellation
//! registry and guarantees exactly one terminal frame and one terminal
//! log event per stream.

#![doc(html_root_url = "https://docs.rs/spire-dispatch/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod dispatcher;
mod stream;

pub use dispatcher::{DispatchReply, Dispatcher};
pub use stream::FrameStream;
