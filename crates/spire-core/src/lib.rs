//! # Spire Core
//!
//! Core types and traits for the Spire dispatch framework.
//!
//! This crate provides the foundational types used throughout Spire:
//!
//! - [`Principal`] - Authenticated caller identity (user or service)
//! - [`ClaimSet`] - Ordered claim map with deterministic duplicate folding
//! - [`RequestContext`] - Per-request context carrying identity and metadata
//! - [`RequestId`] - UUID v7 request identifier
//! - [`DispatchError`] - Standard error taxonomy with HTTP mapping
//! - [`Operation`] - Lifecycle-hooked operation contract
//! - [`UserScoped`] - Capability trait for user-scoped request types

#![doc(html_root_url = "https://docs.rs/spire-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod context;
mod error;
mod identity;
mod operation;

pub use context::{RequestContext, RequestId};
pub use error::{DispatchError, DispatchResult, ErrorCategory, ErrorDetail, ErrorEnvelope};
pub use identity::{ClaimSet, Principal, ServicePrincipal, UserPrincipal};
pub use operation::{Empty, NoContent, Operation, UserScoped};
