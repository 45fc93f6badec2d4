//! HTTP request routing over the operation registry.
//!
//! The gateway owns everything below the transport: reserved endpoints,
//! registry lookup, dispatch, and response encoding for both unary and
//! streaming operations. The accept loop in [`server`](crate::server) hands
//! it a collected body and gets back a complete response.

use std::convert::Infallible;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::StreamExt;
use http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use http::{HeaderMap, Method, Response, StatusCode};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full, StreamBody};
use spire_core::{DispatchError, RequestId};
use spire_dispatch::{DispatchReply, Dispatcher, FrameStream};
use spire_docs::{OpenApiGenerator, SwaggerUi};
use spire_registry::HttpMethod;
use spire_stream::{Frame, NdjsonEncoder, SseEncoder};
use tracing::warn;

/// Response body type used throughout the server.
///
/// Unary replies are buffered; streaming replies are produced frame by
/// frame. Boxing unifies the two.
pub type ResponseBody = UnsyncBoxBody<Bytes, Infallible>;

/// Header carrying the client-supplied stream id for HTTP streaming calls.
///
/// Absent the header, the server generates an id. The WebSocket namespace
/// carries the id in its `start` message instead.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Routes requests to registered operations and reserved endpoints.
pub struct Gateway {
    dispatcher: Arc<Dispatcher>,
    openapi_json: Bytes,
    docs_html: Bytes,
}

impl Gateway {
    /// Builds a gateway over a dispatcher, pre-rendering the OpenAPI
    /// document and the Swagger UI page from the registry.
    #[must_use]
    pub fn new(dispatcher: Arc<Dispatcher>, title: &str, version: &str) -> Self {
        let document = OpenApiGenerator::new(title, version).generate(dispatcher.registry());
        let openapi_json = Bytes::from(serde_json::to_vec(&document).unwrap_or_default());
        let docs_html = SwaggerUi::new(title).html_bytes();
        Self {
            dispatcher,
            openapi_json,
            docs_html,
        }
    }

    /// Responds to the liveness endpoint.
    #[must_use]
    pub fn health(&self) -> Response<ResponseBody> {
        json_response(StatusCode::OK, Bytes::from_static(br#"{"status":"ok"}"#))
    }

    /// Serves the pre-rendered OpenAPI document.
    #[must_use]
    pub fn openapi(&self) -> Response<ResponseBody> {
        json_response(StatusCode::OK, self.openapi_json.clone())
    }

    /// Serves the Swagger UI page.
    #[must_use]
    pub fn docs(&self) -> Response<ResponseBody> {
        Response::builder()
            .status(StatusCode::OK)
            .header(CONTENT_TYPE, "text/html; charset=utf-8")
            .body(full(self.docs_html.clone()))
            .unwrap_or_else(|_| Response::new(full(Bytes::new())))
    }

    /// Dispatches a request through the registry.
    ///
    /// Unknown route and method pairs, and methods the registry cannot
    /// represent, produce a 404 envelope. Streaming entries negotiate their
    /// encoding from the `Accept` header, defaulting to NDJSON.
    pub async fn dispatch(
        &self,
        method: &Method,
        path: &str,
        headers: &HeaderMap,
        body: Bytes,
    ) -> Response<ResponseBody> {
        let Some(parsed) = HttpMethod::parse(method.as_str()) else {
            return error_response(&not_found(method.as_str(), path));
        };
        let Some(entry) = self.dispatcher.registry().lookup(parsed, path) else {
            return error_response(&not_found(parsed.as_str(), path));
        };

        let authorization = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());

        if entry.is_stream() {
            let stream_id = headers
                .get(REQUEST_ID_HEADER)
                .and_then(|v| v.to_str().ok())
                .map_or_else(|| RequestId::new().to_string(), str::to_owned);
            let encoding = StreamEncoding::negotiate(headers);
            match self
                .dispatcher
                .dispatch_stream(entry, authorization, body, &stream_id)
                .await
            {
                Ok(frames) => stream_response(frames, encoding),
                Err(fault) => error_response(&fault),
            }
        } else {
            let reply = self
                .dispatcher
                .dispatch_unary(entry, authorization, body)
                .await;
            json_response(reply.status, reply.body)
        }
    }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("operations", &self.dispatcher.registry().len())
            .finish_non_exhaustive()
    }
}

/// Wire encoding for a streaming response over plain HTTP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamEncoding {
    Ndjson,
    Sse,
}

impl StreamEncoding {
    /// Picks the encoding from the `Accept` header. NDJSON is the default.
    fn negotiate(headers: &HeaderMap) -> Self {
        let accept = headers
            .get(ACCEPT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if accept.contains(SseEncoder::CONTENT_TYPE) {
            Self::Sse
        } else {
            Self::Ndjson
        }
    }

    const fn content_type(self) -> &'static str {
        match self {
            Self::Ndjson => NdjsonEncoder::CONTENT_TYPE,
            Self::Sse => SseEncoder::CONTENT_TYPE,
        }
    }

    fn encode(self, frame: &Frame) -> Bytes {
        let encoded = match self {
            Self::Ndjson => NdjsonEncoder::encode(frame),
            Self::Sse => SseEncoder::encode(frame),
        };
        match encoded {
            Ok(bytes) => bytes,
            Err(error) => {
                warn!(%error, "Dropping unencodable stream frame");
                Bytes::new()
            }
        }
    }
}

fn full(bytes: Bytes) -> ResponseBody {
    Full::new(bytes).boxed_unsync()
}

fn json_response(status: StatusCode, body: Bytes) -> Response<ResponseBody> {
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "application/json")
        .body(full(body))
        .unwrap_or_else(|_| Response::new(full(Bytes::new())))
}

fn error_response(fault: &DispatchError) -> Response<ResponseBody> {
    let reply = DispatchReply::from_error(fault, RequestId::new());
    json_response(reply.status, reply.body)
}

fn not_found(method: &str, path: &str) -> DispatchError {
    DispatchError::not_found(format!("No operation at {method} {path}"))
}

fn stream_response(frames: FrameStream, encoding: StreamEncoding) -> Response<ResponseBody> {
    let encoded = frames.map(move |frame| {
        Ok::<_, Infallible>(hyper::body::Frame::data(encoding.encode(&frame)))
    });
    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, encoding.content_type())
        .body(StreamBody::new(encoded).boxed_unsync())
        .unwrap_or_else(|_| Response::new(full(Bytes::new())))
}

/// Builds the 413 envelope for a body over the configured limit.
pub(crate) fn payload_too_large(limit: usize) -> Response<ResponseBody> {
    let body = serde_json::json!({
        "error": {
            "code": "PAYLOAD_TOO_LARGE",
            "message": format!("Request body exceeds the {limit}-byte limit"),
        },
        "requestId": RequestId::new().to_string(),
    });
    json_response(
        StatusCode::PAYLOAD_TOO_LARGE,
        Bytes::from(body.to_string()),
    )
}

/// Builds the 400 envelope for a body that could not be read.
pub(crate) fn unreadable_body() -> Response<ResponseBody> {
    let body = serde_json::json!({
        "error": {
            "code": "BAD_REQUEST",
            "message": "Failed to read the request body",
        },
        "requestId": RequestId::new().to_string(),
    });
    json_response(StatusCode::BAD_REQUEST, Bytes::from(body.to_string()))
}

/// Builds the 400 envelope for a failed WebSocket handshake.
pub(crate) fn upgrade_rejected(reason: &str) -> Response<ResponseBody> {
    let body = serde_json::json!({
        "error": {
            "code": "BAD_REQUEST",
            "message": reason,
        },
        "requestId": RequestId::new().to_string(),
    });
    json_response(StatusCode::BAD_REQUEST, Bytes::from(body.to_string()))
}
