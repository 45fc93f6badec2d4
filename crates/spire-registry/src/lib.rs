//! # Spire Registry
//!
//! The static operation registry for the Spire dispatch framework.
//!
//! Operations are registered explicitly on a [`RegistryBuilder`] at startup.
//! [`RegistryBuilder::build`] rejects duplicate `(route, method)` pairs with
//! a descriptive error; the resulting [`OperationRegistry`] is immutable and
//! serves lookups without locking.

#![doc(html_root_url = "https://docs.rs/spire-registry/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod entry;
mod registry;

pub use entry::{
    AuthPolicy, HttpMethod, OperationEntry, StreamHandlerFn, UnaryHandlerFn,
};
pub use registry::{OperationRegistry, RegistryBuilder, RegistryError};
