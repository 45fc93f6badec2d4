//! Operation contract for request processing.
//!
//! The [`Operation`] trait defines the lifecycle-hooked interface every
//! dispatchable operation implements. The dispatch middleware drives the
//! hooks strictly in order and short-circuits on the first failure:
//!
//! 1. [`on_before`](Operation::on_before) - pre-processing, may mutate the request
//! 2. [`authorize`](Operation::authorize) - `false` rejects with a forbidden error
//! 3. [`validate`](Operation::validate) - any collected message rejects with the full list
//! 4. [`handle`](Operation::handle) - the business logic
//! 5. [`on_after`](Operation::on_after) - post-processing, runs only on success
//!
//! Operations never log dispatch-level events; start, completion, and fault
//! logging belong to the middleware.

use crate::{DispatchError, RequestContext};
use serde::{Serialize, de::DeserializeOwned};
use std::future::Future;

/// A lifecycle-hooked operation processing typed requests.
///
/// Operations receive a [`RequestContext`] with identity and correlation
/// information along with the deserialized request body. All hooks except
/// [`handle`](Operation::handle) have default no-op implementations.
///
/// # Type Parameters
///
/// - `Req`: The request type (must implement `DeserializeOwned`)
/// - `Res`: The response type (must implement `Serialize`)
///
/// # Example
///
/// ```rust,ignore
/// use spire_core::{DispatchError, Operation, RequestContext};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Deserialize)]
/// struct CreateTagRequest {
///     display_name: String,
/// }
///
/// #[derive(Serialize)]
/// struct CreateTagResponse {
///     id: String,
/// }
///
/// struct CreateTagOperation;
///
/// impl Operation<CreateTagRequest, CreateTagResponse> for CreateTagOperation {
///     async fn validate(&self, _ctx: &RequestContext, req: &CreateTagRequest) -> Vec<String> {
///         let mut errors = Vec::new();
///         if req.display_name.is_empty() {
///             errors.push("displayName must not be empty".to_string());
///         }
///         errors
///     }
///
///     async fn handle(
///         &self,
///         _ctx: &RequestContext,
///         _req: CreateTagRequest,
///     ) -> Result<CreateTagResponse, DispatchError> {
///         Ok(CreateTagResponse { id: "tag-1".to_string() })
///     }
/// }
/// ```
pub trait Operation<Req, Res>: Send + Sync + 'static
where
    Req: DeserializeOwned + Send + 'static,
    Res: Serialize + Send + 'static,
{
    /// Pre-processing hook, runs before any other hook.
    ///
    /// May mutate the request (e.g., normalization, defaulting). The default
    /// implementation does nothing.
    fn on_before(
        &self,
        _ctx: &RequestContext,
        _request: &mut Req,
    ) -> impl Future<Output = ()> + Send {
        async {}
    }

    /// Authorization hook.
    ///
    /// Returning `false` rejects the request with a forbidden error;
    /// [`handle`](Operation::handle) never runs. The default implementation
    /// permits every caller the route policy admitted.
    fn authorize(&self, _ctx: &RequestContext, _request: &Req) -> impl Future<Output = bool> + Send {
        async { true }
    }

    /// Validation hook.
    ///
    /// Returns the full list of validation failures; any non-empty result
    /// rejects the request with every collected message and
    /// [`handle`](Operation::handle) never runs. The default implementation
    /// collects nothing.
    fn validate(
        &self,
        _ctx: &RequestContext,
        _request: &Req,
    ) -> impl Future<Output = Vec<String>> + Send {
        async { Vec::new() }
    }

    /// Handles the request and returns a response.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError`] if the business logic fails. Handler faults
    /// are logged with full context server-side and collapse to a generic
    /// client-safe envelope.
    fn handle(
        &self,
        ctx: &RequestContext,
        request: Req,
    ) -> impl Future<Output = Result<Res, DispatchError>> + Send;

    /// Post-processing hook, runs only after a successful
    /// [`handle`](Operation::handle).
    fn on_after(&self, _ctx: &RequestContext, _response: &Res) -> impl Future<Output = ()> + Send {
        async {}
    }
}

/// Capability trait for request types carrying a user-scope field.
///
/// The dispatch middleware injects the caller's resolved user id into the
/// request exactly once, before any lifecycle hook, and only when the field
/// is unset. `None` means unset; any `Some` value, **including the empty
/// string**, is caller-supplied and is never overwritten.
///
/// # Example
///
/// ```
/// use spire_core::UserScoped;
///
/// struct ListTagsRequest {
///     user_id: Option<String>,
/// }
///
/// impl UserScoped for ListTagsRequest {
///     fn user_id(&self) -> Option<&str> {
///         self.user_id.as_deref()
///     }
///
///     fn set_user_id(&mut self, user_id: String) {
///         self.user_id = Some(user_id);
///     }
/// }
/// ```
pub trait UserScoped {
    /// Returns the user-scope field, `None` when unset.
    fn user_id(&self) -> Option<&str>;

    /// Sets the user-scope field.
    fn set_user_id(&mut self, user_id: String);
}

/// Unit request type for operations that don't need a request body.
///
/// Use this for operations where all parameters come from the caller's
/// identity or the route itself.
#[derive(Debug, Clone, Default, serde::Deserialize, serde::Serialize)]
pub struct Empty {}

/// Unit response type for operations that don't return a body.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct NoContent {}
