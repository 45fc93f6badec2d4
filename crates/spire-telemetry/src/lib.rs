//! # Spire Telemetry
//!
//! Structured logging initialization for the Spire platform.
//!
//! The dispatch layer emits `info` start/complete events, `warn` for auth and
//! validation rejections, `error` with full context for handler faults, and
//! exactly one terminal event per stream. This crate installs the
//! `tracing-subscriber` stack those events flow through.
//!
//! # Example
//!
//! ```rust,ignore
//! use spire_telemetry::{init_logging, LogConfig};
//!
//! init_logging(&LogConfig::default())?;
//!
//! tracing::info!(operation = "/tag/create", "Operation started");
//! ```

#![doc(html_root_url = "https://docs.rs/spire-telemetry/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod logging;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{create_env_filter, init_logging, LogConfig};
