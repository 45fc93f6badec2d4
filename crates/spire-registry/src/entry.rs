//! Operation registry entries.
//!
//! An [`OperationEntry`] binds a route and method to a type-erased dispatch
//! function. The typed constructors ([`unary`](OperationEntry::unary),
//! [`unary_scoped`](OperationEntry::unary_scoped),
//! [`stream`](OperationEntry::stream),
//! [`stream_scoped`](OperationEntry::stream_scoped)) capture the concrete
//! operation and erase it behind `Arc<dyn Fn>` so entries of different types
//! live in one registry.
//!
//! The erased function decodes the body, applies user-scope injection for
//! scoped entries, and drives the operation lifecycle in its fixed order,
//! short-circuiting on the first failure.

use bytes::Bytes;
use futures_util::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use spire_core::{DispatchError, Operation, Principal, RequestContext, UserScoped};
use spire_stream::{CancelToken, StreamOperation, ValueStream};
use std::sync::Arc;

/// The HTTP methods an operation can be registered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// HTTP GET.
    Get,
    /// HTTP POST.
    Post,
    /// HTTP PUT.
    Put,
    /// HTTP DELETE.
    Delete,
}

impl HttpMethod {
    /// Parses a method string case-insensitively.
    #[must_use]
    pub fn parse(method: &str) -> Option<Self> {
        match method.to_ascii_uppercase().as_str() {
            "GET" => Some(Self::Get),
            "POST" => Some(Self::Post),
            "PUT" => Some(Self::Put),
            "DELETE" => Some(Self::Delete),
            _ => None,
        }
    }

    /// Returns the uppercase wire form.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The authentication policy a route enforces before any hook fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AuthPolicy {
    /// Anonymous callers are admitted.
    None,
    /// Requires an authenticated user principal.
    User,
    /// Requires an authenticated service principal.
    Service,
    /// Requires any authenticated principal.
    Either,
}

impl AuthPolicy {
    /// Returns `true` if the policy admits the caller.
    #[must_use]
    pub fn admits(&self, principal: Option<&Principal>) -> bool {
        match self {
            Self::None => true,
            Self::User => matches!(principal, Some(Principal::User(_))),
            Self::Service => matches!(principal, Some(Principal::Service(_))),
            Self::Either => principal.is_some(),
        }
    }

    /// Returns `true` for policies that require credentials.
    #[must_use]
    pub const fn requires_authentication(&self) -> bool {
        !matches!(self, Self::None)
    }
}

/// Type-erased unary dispatch function.
///
/// Takes the prepared request context and raw body, returns the serialized
/// response body.
pub type UnaryHandlerFn =
    Arc<dyn Fn(RequestContext, Bytes) -> BoxFuture<'static, Result<Bytes, DispatchError>> + Send + Sync>;

/// Type-erased stream dispatch function.
///
/// Takes the prepared request context, raw body, and cancellation token,
/// returns the operation's item stream.
pub type StreamHandlerFn = Arc<
    dyn Fn(RequestContext, Bytes, CancelToken) -> BoxFuture<'static, Result<ValueStream, DispatchError>>
        + Send
        + Sync,
>;

enum HandlerBinding {
    Unary(UnaryHandlerFn),
    Stream(StreamHandlerFn),
}

/// One registered operation: route, method, metadata, and the type-erased
/// dispatch function.
pub struct OperationEntry {
    route: String,
    method: HttpMethod,
    group: String,
    auth_policy: AuthPolicy,
    summary: Option<String>,
    request_type: &'static str,
    binding: HandlerBinding,
}

impl OperationEntry {
    /// Registers a unary operation.
    pub fn unary<Req, Res, O>(
        route: impl Into<String>,
        method: HttpMethod,
        group: impl Into<String>,
        auth_policy: AuthPolicy,
        operation: O,
    ) -> Self
    where
        Req: DeserializeOwned + Send + 'static,
        Res: Serialize + Send + 'static,
        O: Operation<Req, Res>,
    {
        let operation = Arc::new(operation);
        let handler: UnaryHandlerFn = Arc::new(move |ctx, body| {
            let operation = Arc::clone(&operation);
            Box::pin(async move {
                let request: Req = decode_request(&body)?;
                drive_unary(operation.as_ref(), &ctx, request).await
            })
        });
        Self {
            route: route.into(),
            method,
            group: group.into(),
            auth_policy,
            summary: None,
            request_type: std::any::type_name::<Req>(),
            binding: HandlerBinding::Unary(handler),
        }
    }

    /// Registers a unary operation whose request is user-scoped.
    ///
    /// Before any lifecycle hook, and exactly once, the caller's resolved
    /// user id is injected when the request's user-scope field is unset and
    /// the caller is authenticated. Caller-supplied values, including the
    /// empty string, are never overwritten.
    pub fn unary_scoped<Req, Res, O>(
        route: impl Into<String>,
        method: HttpMethod,
        group: impl Into<String>,
        auth_policy: AuthPolicy,
        operation: O,
    ) -> Self
    where
        Req: DeserializeOwned + UserScoped + Send + 'static,
        Res: Serialize + Send + 'static,
        O: Operation<Req, Res>,
    {
        let operation = Arc::new(operation);
        let handler: UnaryHandlerFn = Arc::new(move |ctx, body| {
            let operation = Arc::clone(&operation);
            Box::pin(async move {
                let mut request: Req = decode_request(&body)?;
                inject_user_scope(&mut request, &ctx);
                drive_unary(operation.as_ref(), &ctx, request).await
            })
        });
        Self {
            route: route.into(),
            method,
            group: group.into(),
            auth_policy,
            summary: None,
            request_type: std::any::type_name::<Req>(),
            binding: HandlerBinding::Unary(handler),
        }
    }

    /// Registers a streaming operation.
    pub fn stream<Req, O>(
        route: impl Into<String>,
        method: HttpMethod,
        group: impl Into<String>,
        auth_policy: AuthPolicy,
        operation: O,
    ) -> Self
    where
        Req: DeserializeOwned + Send + 'static,
        O: StreamOperation<Req>,
    {
        let operation = Arc::new(operation);
        let handler: StreamHandlerFn = Arc::new(move |ctx, body, cancel| {
            let operation = Arc::clone(&operation);
            Box::pin(async move {
                let request: Req = decode_request(&body)?;
                drive_stream(operation.as_ref(), &ctx, request, cancel).await
            })
        });
        Self {
            route: route.into(),
            method,
            group: group.into(),
            auth_policy,
            summary: None,
            request_type: std::any::type_name::<Req>(),
            binding: HandlerBinding::Stream(handler),
        }
    }

    /// Registers a streaming operation whose request is user-scoped.
    pub fn stream_scoped<Req, O>(
        route: impl Into<String>,
        method: HttpMethod,
        group: impl Into<String>,
        auth_policy: AuthPolicy,
        operation: O,
    ) -> Self
    where
        Req: DeserializeOwned + UserScoped + Send + 'static,
        O: StreamOperation<Req>,
    {
        let operation = Arc::new(operation);
        let handler: StreamHandlerFn = Arc::new(move |ctx, body, cancel| {
            let operation = Arc::clone(&operation);
            Box::pin(async move {
                let mut request: Req = decode_request(&body)?;
                inject_user_scope(&mut request, &ctx);
                drive_stream(operation.as_ref(), &ctx, request, cancel).await
            })
        });
        Self {
            route: route.into(),
            method,
            group: group.into(),
            auth_policy,
            summary: None,
            request_type: std::any::type_name::<Req>(),
            binding: HandlerBinding::Stream(handler),
        }
    }

    /// Sets a human-readable summary for documentation synthesis.
    #[must_use]
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    /// Returns the route path.
    #[must_use]
    pub fn route(&self) -> &str {
        &self.route
    }

    /// Returns the HTTP method.
    #[must_use]
    pub const fn method(&self) -> HttpMethod {
        self.method
    }

    /// Returns the operation group (documentation tag).
    #[must_use]
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Returns the authentication policy.
    #[must_use]
    pub const fn auth_policy(&self) -> AuthPolicy {
        self.auth_policy
    }

    /// Returns the documentation summary, if set.
    #[must_use]
    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    /// Returns the request type name, for logging.
    #[must_use]
    pub const fn request_type(&self) -> &'static str {
        self.request_type
    }

    /// Returns `true` for streaming entries.
    #[must_use]
    pub const fn is_stream(&self) -> bool {
        matches!(self.binding, HandlerBinding::Stream(_))
    }

    /// Returns the unary dispatch function for unary entries.
    #[must_use]
    pub fn unary_handler(&self) -> Option<&UnaryHandlerFn> {
        match &self.binding {
            HandlerBinding::Unary(handler) => Some(handler),
            HandlerBinding::Stream(_) => None,
        }
    }

    /// Returns the stream dispatch function for streaming entries.
    #[must_use]
    pub fn stream_handler(&self) -> Option<&StreamHandlerFn> {
        match &self.binding {
            HandlerBinding::Stream(handler) => Some(handler),
            HandlerBinding::Unary(_) => None,
        }
    }
}

impl std::fmt::Debug for OperationEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationEntry")
            .field("route", &self.route)
            .field("method", &self.method)
            .field("group", &self.group)
            .field("auth_policy", &self.auth_policy)
            .field("is_stream", &self.is_stream())
            .finish_non_exhaustive()
    }
}

/// Decodes a request body; an empty body decodes as the empty JSON object.
fn decode_request<Req: DeserializeOwned>(body: &Bytes) -> Result<Req, DispatchError> {
    let slice: &[u8] = if body.is_empty() { b"{}" } else { body };
    serde_json::from_slice(slice)
        .map_err(|error| DispatchError::validation(vec![format!("Invalid request body: {error}")]))
}

/// Injects the caller's resolved user id into an unset user-scope field.
fn inject_user_scope<Req: UserScoped>(request: &mut Req, ctx: &RequestContext) {
    let resolved = ctx.resolved_user_id();
    if request.user_id().is_none() && !resolved.is_empty() {
        request.set_user_id(resolved.to_string());
    }
}

/// Drives the unary lifecycle in its fixed order.
async fn drive_unary<Req, Res, O>(
    operation: &O,
    ctx: &RequestContext,
    mut request: Req,
) -> Result<Bytes, DispatchError>
where
    Req: DeserializeOwned + Send + 'static,
    Res: Serialize + Send + 'static,
    O: Operation<Req, Res>,
{
    operation.on_before(ctx, &mut request).await;

    if !operation.authorize(ctx, &request).await {
        return Err(DispatchError::forbidden("Operation authorization denied"));
    }

    let errors = operation.validate(ctx, &request).await;
    if !errors.is_empty() {
        return Err(DispatchError::validation(errors));
    }

    let response = operation.handle(ctx, request).await?;
    operation.on_after(ctx, &response).await;

    let body = serde_json::to_vec(&response).map_err(|error| {
        DispatchError::handler_with_source("Response serialization failed", error)
    })?;
    Ok(Bytes::from(body))
}

/// Drives the streaming lifecycle up to stream production.
async fn drive_stream<Req, O>(
    operation: &O,
    ctx: &RequestContext,
    mut request: Req,
    cancel: CancelToken,
) -> Result<ValueStream, DispatchError>
where
    Req: DeserializeOwned + Send + 'static,
    O: StreamOperation<Req>,
{
    operation.on_before(ctx, &mut request).await;

    if !operation.authorize(ctx, &request).await {
        return Err(DispatchError::forbidden("Operation authorization denied"));
    }

    let errors = operation.validate(ctx, &request).await;
    if !errors.is_empty() {
        return Err(DispatchError::validation(errors));
    }

    operation.stream(ctx, request, cancel).await
}
