//! The per-call dispatcher.

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use http::StatusCode;
use spire_auth::TokenValidator;
use spire_core::{DispatchError, RequestContext, RequestId};
use spire_registry::{AuthPolicy, OperationEntry, OperationRegistry};
use spire_stream::CancelRegistry;
use tracing::{error, info, warn};

use crate::stream::{frame_stream, FrameStream, StreamGuard};

/// The serialized outcome of a unary dispatch: an HTTP status and a JSON
/// body, either the operation's response or an error envelope.
#[derive(Debug, Clone)]
pub struct DispatchReply {
    /// The HTTP status code.
    pub status: StatusCode,
    /// The JSON response body.
    pub body: Bytes,
}

impl DispatchReply {
    /// Builds a successful reply.
    #[must_use]
    pub const fn ok(body: Bytes) -> Self {
        Self {
            status: StatusCode::OK,
            body,
        }
    }

    /// Builds an error-envelope reply for the given failure.
    #[must_use]
    pub fn from_error(error: &DispatchError, request_id: RequestId) -> Self {
        let id = request_id.to_string();
        let envelope = error.to_envelope(Some(&id));
        let body = serde_json::to_vec(&envelope).unwrap_or_default();
        Self {
            status: error.status_code(),
            body: Bytes::from(body),
        }
    }
}

/// Drives registered operations through the per-call middleware.
///
/// The dispatcher is built once at startup and shared across connections.
/// For every call it resolves the caller from the `Authorization` header,
/// enforces the entry's [`AuthPolicy`], logs start and completion, and runs
/// the entry's type-erased lifecycle function.
///
/// Streaming calls additionally claim the client-supplied request id in the
/// [`CancelRegistry`]; a second start for a live id is rejected with a
/// conflict and the original stream is left untouched.
pub struct Dispatcher {
    registry: Arc<OperationRegistry>,
    validator: Arc<TokenValidator>,
    cancellations: Arc<CancelRegistry>,
}

impl Dispatcher {
    /// Creates a dispatcher over a built registry and token validator.
    #[must_use]
    pub fn new(registry: Arc<OperationRegistry>, validator: Arc<TokenValidator>) -> Self {
        Self {
            registry,
            validator,
            cancellations: Arc::new(CancelRegistry::new()),
        }
    }

    /// Returns the operation registry.
    #[must_use]
    pub const fn registry(&self) -> &Arc<OperationRegistry> {
        &self.registry
    }

    /// Returns the stream cancellation registry.
    #[must_use]
    pub const fn cancellations(&self) -> &Arc<CancelRegistry> {
        &self.cancellations
    }

    /// Dispatches a unary call through the full middleware order.
    ///
    /// Never fails: every error path is converted into an error-envelope
    /// reply with the category's status code.
    pub async fn dispatch_unary(
        &self,
        entry: &OperationEntry,
        authorization: Option<&str>,
        body: Bytes,
    ) -> DispatchReply {
        let mut ctx = RequestContext::new().with_operation(entry.route());
        let request_id = ctx.request_id();

        if let Err(fault) = self.authenticate(entry, authorization, &mut ctx) {
            return DispatchReply::from_error(&fault, request_id);
        }

        let Some(handler) = entry.unary_handler() else {
            let fault = DispatchError::not_found(format!(
                "{} {} is not a unary operation",
                entry.method(),
                entry.route()
            ));
            return DispatchReply::from_error(&fault, request_id);
        };

        let user_id = ctx.log_id();
        info!(
            operation = entry.route(),
            user_id = %user_id,
            request_type = entry.request_type(),
            "Operation started"
        );

        let started = Instant::now();
        match handler(ctx, body).await {
            Ok(response) => {
                let elapsed_ms =
                    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                info!(
                    operation = entry.route(),
                    user_id = %user_id,
                    elapsed_ms,
                    "Operation completed"
                );
                DispatchReply::ok(response)
            }
            Err(fault) => {
                log_failure(entry.route(), &user_id, &fault);
                DispatchReply::from_error(&fault, request_id)
            }
        }
    }

    /// Dispatches a streaming call and returns its frame stream.
    ///
    /// The stream id (the client-supplied `requestId`) is claimed in the
    /// cancellation registry for the lifetime of the stream; the returned
    /// stream releases it on every path, including consumer disconnect.
    ///
    /// # Errors
    ///
    /// Fails with `Unauthenticated` when the policy rejects the caller,
    /// `Conflict` when the stream id is already live, and whatever the
    /// operation's pre-stream hooks raise.
    pub async fn dispatch_stream(
        &self,
        entry: &OperationEntry,
        authorization: Option<&str>,
        body: Bytes,
        stream_id: &str,
    ) -> Result<FrameStream, DispatchError> {
        let mut ctx = RequestContext::new().with_operation(entry.route());
        self.authenticate(entry, authorization, &mut ctx)?;

        let Some(handler) = entry.stream_handler() else {
            return Err(DispatchError::not_found(format!(
                "{} {} is not a streaming operation",
                entry.method(),
                entry.route()
            )));
        };

        let Some(token) = self.cancellations.register(stream_id) else {
            warn!(
                operation = entry.route(),
                stream_id, "Duplicate stream registration rejected"
            );
            return Err(DispatchError::conflict(format!(
                "A stream with requestId {stream_id} is already active"
            )));
        };

        let user_id = ctx.log_id();
        info!(
            operation = entry.route(),
            user_id = %user_id,
            request_type = entry.request_type(),
            stream_id,
            "Stream started"
        );

        match handler(ctx, body, token.clone()).await {
            Ok(items) => {
                let guard = StreamGuard::new(
                    stream_id,
                    entry.route(),
                    user_id,
                    Arc::clone(&self.cancellations),
                );
                Ok(frame_stream(items, token, guard))
            }
            Err(fault) => {
                self.cancellations.remove(stream_id);
                log_failure(entry.route(), &user_id, &fault);
                Err(fault)
            }
        }
    }

    /// Resolves the caller and enforces the entry's policy.
    ///
    /// An unusable token on a route whose policy admits anonymous callers
    /// degrades to anonymous instead of failing.
    fn authenticate(
        &self,
        entry: &OperationEntry,
        authorization: Option<&str>,
        ctx: &mut RequestContext,
    ) -> Result<(), DispatchError> {
        if let Some(header) = authorization {
            if let Some(principal) = self.validator.validate(header) {
                ctx.set_principal(principal);
            }
        }

        if entry.auth_policy().admits(ctx.principal()) {
            return Ok(());
        }

        warn!(
            operation = entry.route(),
            policy = ?entry.auth_policy(),
            authenticated = ctx.principal().is_some(),
            "Authentication policy rejected the caller"
        );
        Err(policy_violation(
            entry.auth_policy(),
            ctx.principal().is_some(),
        ))
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("operations", &self.registry.len())
            .field("live_streams", &self.cancellations.len())
            .finish_non_exhaustive()
    }
}

fn policy_violation(policy: AuthPolicy, authenticated: bool) -> DispatchError {
    let message = if authenticated {
        match policy {
            AuthPolicy::User => "This operation requires a user principal",
            AuthPolicy::Service => "This operation requires a service principal",
            _ => "Credentials do not satisfy this operation's policy",
        }
    } else {
        "Missing or invalid bearer token"
    };
    DispatchError::unauthenticated(message)
}

/// Logs a dispatch failure with server-side detail.
///
/// Handler faults keep their message and source chain in the log; every
/// other category is a caller mistake and logs at `warn`.
fn log_failure(operation: &str, user_id: &str, fault: &DispatchError) {
    match fault {
        DispatchError::Handler { .. } => {
            error!(
                operation,
                user_id,
                error = %fault,
                source = ?std::error::Error::source(fault),
                "Operation failed"
            );
        }
        _ => {
            warn!(operation, user_id, error = %fault, "Operation rejected");
        }
    }
}
