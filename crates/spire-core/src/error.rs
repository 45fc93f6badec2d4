//! Error types for Spire.
//!
//! This module provides the [`DispatchError`] type, the standard error type
//! used throughout the dispatch pipeline, together with its serializable
//! envelope form.
//!
//! Operation faults are deliberately opaque on the wire: a failed `handle`
//! produces a generic client-safe envelope while the full error chain is
//! logged server-side. Envelope JSON uses camelCase properties and the
//! category serializes as a string.

use http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using [`DispatchError`].
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Categories of errors for classification and handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorCategory {
    /// No usable credentials, or credentials that fail policy.
    Unauthenticated,
    /// Authenticated but denied by the operation's authorize hook.
    Forbidden,
    /// Request validation errors.
    Validation,
    /// Operation handler fault (details never leave the server).
    Handler,
    /// No operation registered for the route and method.
    NotFound,
    /// Conflicting state (e.g., duplicate stream registration).
    Conflict,
}

impl ErrorCategory {
    /// Returns the default HTTP status code for this error category.
    #[must_use]
    pub const fn default_status_code(&self) -> StatusCode {
        match self {
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Validation | Self::Handler => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Conflict => StatusCode::CONFLICT,
        }
    }
}

/// Standard error type for the Spire dispatch pipeline.
///
/// `DispatchError` provides structured errors with:
/// - Error categorization
/// - HTTP status code mapping
/// - Serializable error envelope for responses
/// - Error chaining support
///
/// # Example
///
/// ```
/// use spire_core::DispatchError;
///
/// fn check_name(name: &str) -> Result<(), DispatchError> {
///     if name.is_empty() {
///         return Err(DispatchError::validation(vec![
///             "name must not be empty".to_string(),
///         ]));
///     }
///     Ok(())
/// }
/// ```
#[derive(Error, Debug)]
pub enum DispatchError {
    /// The caller presented no usable credentials, or credentials of the
    /// wrong kind for the route's policy.
    #[error("Unauthenticated: {message}")]
    Unauthenticated {
        /// Human-readable error message.
        message: String,
        /// Optional structured payload for the envelope.
        details: Option<serde_json::Value>,
    },

    /// The operation's authorize hook denied the caller.
    #[error("Forbidden: {message}")]
    Forbidden {
        /// Human-readable error message.
        message: String,
    },

    /// Request validation failed.
    #[error("Validation failed: {}", errors.join("; "))]
    Validation {
        /// The full list of validation failures, in declaration order.
        errors: Vec<String>,
    },

    /// The operation handler faulted.
    ///
    /// The message and source are for server-side logs only; the envelope
    /// carries a generic message.
    #[error("Operation failed: {message}")]
    Handler {
        /// Server-side error message.
        message: String,
        /// The underlying error (not exposed to clients).
        #[source]
        source: Option<anyhow::Error>,
    },

    /// No operation registered for the route and method.
    #[error("Not found: {message}")]
    NotFound {
        /// Human-readable error message.
        message: String,
    },

    /// Conflicting state, such as a duplicate stream registration.
    #[error("Conflict: {message}")]
    Conflict {
        /// Human-readable error message.
        message: String,
    },
}

impl DispatchError {
    /// Creates an unauthenticated error.
    #[must_use]
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::Unauthenticated {
            message: message.into(),
            details: None,
        }
    }

    /// Creates an unauthenticated error with a structured envelope payload.
    #[must_use]
    pub fn unauthenticated_with_details(
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self::Unauthenticated {
            message: message.into(),
            details: Some(details),
        }
    }

    /// Creates a forbidden error.
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    /// Creates a validation error from the collected failure list.
    #[must_use]
    pub fn validation(errors: Vec<String>) -> Self {
        Self::Validation { errors }
    }

    /// Creates a handler fault with a message.
    #[must_use]
    pub fn handler(message: impl Into<String>) -> Self {
        Self::Handler {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a handler fault with a source error.
    pub fn handler_with_source(
        message: impl Into<String>,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        Self::Handler {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Creates a not found error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Creates a conflict error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Returns the error category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Unauthenticated { .. } => ErrorCategory::Unauthenticated,
            Self::Forbidden { .. } => ErrorCategory::Forbidden,
            Self::Validation { .. } => ErrorCategory::Validation,
            Self::Handler { .. } => ErrorCategory::Handler,
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::Conflict { .. } => ErrorCategory::Conflict,
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        self.category().default_status_code()
    }

    /// Returns the message safe to send to clients.
    ///
    /// Handler faults collapse to a generic message; their real message and
    /// source chain stay in server-side logs.
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            Self::Handler { .. } => "The request could not be processed.".to_string(),
            other => other.to_string(),
        }
    }

    /// Converts this error to a serializable error envelope.
    #[must_use]
    pub fn to_envelope(&self, request_id: Option<&str>) -> ErrorEnvelope {
        ErrorEnvelope {
            error: ErrorDetail {
                code: self.error_code(),
                message: self.client_message(),
                category: self.category(),
                details: self.error_details(),
            },
            request_id: request_id.map(ToString::to_string),
        }
    }

    /// Returns a machine-readable error code.
    #[must_use]
    fn error_code(&self) -> String {
        match self {
            Self::Unauthenticated { .. } => "UNAUTHENTICATED",
            Self::Forbidden { .. } => "FORBIDDEN",
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::Handler { .. } => "OPERATION_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Conflict { .. } => "CONFLICT",
        }
        .to_string()
    }

    /// Returns additional error details for the envelope.
    #[must_use]
    fn error_details(&self) -> Option<serde_json::Value> {
        match self {
            Self::Validation { errors } => Some(serde_json::json!({ "errors": errors })),
            Self::Unauthenticated {
                details: Some(details),
                ..
            } => Some(details.clone()),
            _ => None,
        }
    }
}

/// Serializable error envelope for HTTP and stream responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    /// The error details.
    pub error: ErrorDetail,
    /// The request ID for correlation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Error detail within an envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetail {
    /// Machine-readable error code.
    pub code: String,
    /// Client-safe human-readable message.
    pub message: String,
    /// Error category.
    pub category: ErrorCategory,
    /// Additional error details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthenticated_error() {
        let error = DispatchError::unauthenticated("Missing bearer token");
        assert_eq!(error.category(), ErrorCategory::Unauthenticated);
        assert_eq!(error.status_code(), StatusCode::UNAUTHORIZED);
        assert!(error.to_string().contains("Missing bearer token"));
    }

    #[test]
    fn test_unauthenticated_with_details_payload() {
        let error = DispatchError::unauthenticated_with_details(
            "Invalid credentials",
            serde_json::json!({ "result": false }),
        );
        let envelope = error.to_envelope(None);
        let details = envelope.error.details.expect("details should be set");
        assert_eq!(details["result"], false);
    }

    #[test]
    fn test_forbidden_error() {
        let error = DispatchError::forbidden("Caller lacks the editor role");
        assert_eq!(error.category(), ErrorCategory::Forbidden);
        assert_eq!(error.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_validation_error_carries_full_list() {
        let error = DispatchError::validation(vec![
            "displayName must not be empty".to_string(),
            "categoryId must be a UUID".to_string(),
        ]);
        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);

        let envelope = error.to_envelope(Some("req-123"));
        let details = envelope.error.details.expect("details should be set");
        let errors = details["errors"].as_array().expect("errors array");
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0], "displayName must not be empty");
    }

    #[test]
    fn test_handler_fault_is_opaque_to_clients() {
        let error = DispatchError::handler_with_source(
            "tag insert failed",
            std::io::Error::new(std::io::ErrorKind::Other, "connection reset"),
        );
        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);

        let envelope = error.to_envelope(Some("req-123"));
        assert_eq!(envelope.error.code, "OPERATION_ERROR");
        assert!(!envelope.error.message.contains("tag insert failed"));
        assert!(!envelope.error.message.contains("connection reset"));
        assert!(envelope.error.details.is_none());

        // The server-side rendering keeps the real message.
        assert!(error.to_string().contains("tag insert failed"));
    }

    #[test]
    fn test_handler_fault_source_chain() {
        let error = DispatchError::handler_with_source(
            "lookup failed",
            std::io::Error::new(std::io::ErrorKind::NotFound, "row missing"),
        );
        let source = std::error::Error::source(&error).expect("source should be set");
        assert!(source.to_string().contains("row missing"));
    }

    #[test]
    fn test_not_found_error() {
        let error = DispatchError::not_found("No operation at POST /nope");
        assert_eq!(error.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_conflict_error() {
        let error = DispatchError::conflict("requestId already streaming");
        assert_eq!(error.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_envelope_serialization_is_camel_case() {
        let error = DispatchError::unauthenticated("Missing bearer token");
        let envelope = error.to_envelope(Some("req-456"));

        let json = serde_json::to_string(&envelope).expect("serialization should work");
        assert!(json.contains("\"code\":\"UNAUTHENTICATED\""));
        assert!(json.contains("\"requestId\":\"req-456\""));
        assert!(json.contains("\"category\":\"unauthenticated\""));
    }

    #[test]
    fn test_all_error_categories_have_error_status_codes() {
        let categories = [
            ErrorCategory::Unauthenticated,
            ErrorCategory::Forbidden,
            ErrorCategory::Validation,
            ErrorCategory::Handler,
            ErrorCategory::NotFound,
            ErrorCategory::Conflict,
        ];

        for category in categories {
            let status = category.default_status_code();
            assert!(
                status.is_client_error(),
                "Category {:?} should map to a client error status, got {}",
                category,
                status
            );
        }
    }
}
