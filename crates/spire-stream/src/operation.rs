//! Streaming operation contract.

use crate::CancelToken;
use futures_util::stream::BoxStream;
use serde::de::DeserializeOwned;
use spire_core::{DispatchError, RequestContext};
use std::future::Future;

/// The item stream a streaming operation produces.
///
/// Each `Ok` value becomes a data frame; an `Err` terminates the stream with
/// an error frame.
pub type ValueStream = BoxStream<'static, Result<serde_json::Value, DispatchError>>;

/// A lifecycle-hooked operation producing a stream of results.
///
/// The dispatch middleware drives `on_before`/`authorize`/`validate` exactly
/// as for unary operations, then calls [`stream`](StreamOperation::stream)
/// and forwards each produced value to the transport as it arrives, never
/// buffered. Producers observe the [`CancelToken`] cooperatively between
/// items and stop promptly once it fires.
///
/// # Example
///
/// ```rust,ignore
/// use futures_util::StreamExt;
/// use spire_core::{DispatchError, Empty, RequestContext};
/// use spire_stream::{CancelToken, StreamOperation, ValueStream};
///
/// struct CountdownOperation;
///
/// impl StreamOperation<Empty> for CountdownOperation {
///     async fn stream(
///         &self,
///         _ctx: &RequestContext,
///         _request: Empty,
///         cancel: CancelToken,
///     ) -> Result<ValueStream, DispatchError> {
///         Ok(futures_util::stream::iter((0..10).rev())
///             .take_while(move |_| {
///                 let live = !cancel.is_cancelled();
///                 async move { live }
///             })
///             .map(|n| Ok(serde_json::json!({ "remaining": n })))
///             .boxed())
///     }
/// }
/// ```
pub trait StreamOperation<Req>: Send + Sync + 'static
where
    Req: DeserializeOwned + Send + 'static,
{
    /// Pre-processing hook, runs before any other hook.
    fn on_before(
        &self,
        _ctx: &RequestContext,
        _request: &mut Req,
    ) -> impl Future<Output = ()> + Send {
        async {}
    }

    /// Authorization hook; `false` rejects before the first frame.
    fn authorize(&self, _ctx: &RequestContext, _request: &Req) -> impl Future<Output = bool> + Send {
        async { true }
    }

    /// Validation hook; any collected message rejects before the first frame.
    fn validate(
        &self,
        _ctx: &RequestContext,
        _request: &Req,
    ) -> impl Future<Output = Vec<String>> + Send {
        async { Vec::new() }
    }

    /// Produces the item stream.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError`] if the stream cannot be started; once
    /// started, failures surface as an `Err` item inside the stream.
    fn stream(
        &self,
        ctx: &RequestContext,
        request: Req,
        cancel: CancelToken,
    ) -> impl Future<Output = Result<ValueStream, DispatchError>> + Send;
}
