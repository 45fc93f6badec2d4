//! Request context types.
//!
//! The [`RequestContext`] carries all per-request state through the dispatch
//! pipeline and into operations.

use crate::identity::Principal;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use uuid::Uuid;

/// A unique identifier for each request, using UUID v7.
///
/// UUID v7 is time-ordered, which makes it ideal for request tracking
/// and log correlation.
///
/// # Example
///
/// ```
/// use spire_core::RequestId;
///
/// let id = RequestId::new();
/// println!("Request ID: {}", id);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Creates a new unique request ID using UUID v7.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Creates a `RequestId` from an existing UUID.
    ///
    /// This is useful when parsing request IDs from headers or other sources.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for RequestId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<RequestId> for Uuid {
    fn from(id: RequestId) -> Self {
        id.0
    }
}

/// Per-request context that flows through the dispatch pipeline.
///
/// `RequestContext` carries all the information needed to process a request:
/// - Unique request ID for log correlation
/// - The authenticated [`Principal`], or `None` for anonymous callers
/// - The operation name being dispatched
/// - Request timing information
///
/// # Example
///
/// ```
/// use spire_core::RequestContext;
///
/// let ctx = RequestContext::new();
/// println!("Processing request: {}", ctx.request_id());
/// ```
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Unique identifier for this request.
    request_id: RequestId,

    /// The authenticated caller, `None` when anonymous.
    principal: Option<Principal>,

    /// The operation name being dispatched (e.g., "tag/create").
    operation: Option<String>,

    /// When the request started processing.
    started_at: Instant,
}

impl RequestContext {
    /// Creates a new request context with a fresh request ID.
    ///
    /// The caller defaults to anonymous.
    #[must_use]
    pub fn new() -> Self {
        Self {
            request_id: RequestId::new(),
            principal: None,
            operation: None,
            started_at: Instant::now(),
        }
    }

    /// Creates a new request context with the specified request ID.
    #[must_use]
    pub fn with_request_id(request_id: RequestId) -> Self {
        Self {
            request_id,
            principal: None,
            operation: None,
            started_at: Instant::now(),
        }
    }

    /// Creates a mock context for testing purposes.
    #[must_use]
    pub fn mock() -> Self {
        Self::new()
    }

    /// Returns the request ID.
    #[must_use]
    pub const fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Returns the authenticated caller, `None` when anonymous.
    #[must_use]
    pub const fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    /// Sets the authenticated caller.
    pub fn set_principal(&mut self, principal: Principal) {
        self.principal = Some(principal);
    }

    /// Returns a new context with the specified caller.
    #[must_use]
    pub fn with_principal(mut self, principal: Principal) -> Self {
        self.principal = Some(principal);
        self
    }

    /// Returns the operation name if set.
    #[must_use]
    pub fn operation(&self) -> Option<&str> {
        self.operation.as_deref()
    }

    /// Sets the operation name.
    pub fn set_operation(&mut self, operation: impl Into<String>) {
        self.operation = Some(operation.into());
    }

    /// Returns a new context with the specified operation name.
    #[must_use]
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    /// Returns the caller's user id, or the empty sentinel when anonymous.
    ///
    /// This is the value injected into [`UserScoped`](crate::UserScoped)
    /// request types by the dispatch middleware.
    #[must_use]
    pub fn resolved_user_id(&self) -> &str {
        self.principal.as_ref().map_or("", Principal::id)
    }

    /// Returns a caller identifier suitable for logging.
    #[must_use]
    pub fn log_id(&self) -> String {
        self.principal
            .as_ref()
            .map_or_else(|| "anonymous".to_string(), Principal::log_id)
    }

    /// Returns the elapsed time since the request started.
    #[must_use]
    pub fn elapsed(&self) -> std::time::Duration {
        self.started_at.elapsed()
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}
