//! Telemetry error types.

use thiserror::Error;

/// Result type alias using [`TelemetryError`].
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Errors raised while initializing telemetry.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Logging initialization failed.
    #[error("failed to initialize logging: {0}")]
    LoggingInit(String),
}
