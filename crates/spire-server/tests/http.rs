//! End-to-end tests over a real listener.

use std::net::SocketAddr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HOST};
use http::{Request, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper_util::rt::TokioIo;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use spire_config::SpireConfig;
use spire_core::{DispatchResult, Empty, Operation, RequestContext};
use spire_registry::{AuthPolicy, HttpMethod, OperationEntry, RegistryBuilder};
use spire_server::{Server, ServerError, ShutdownSignal};
use spire_stream::{CancelToken, StreamOperation, ValueStream};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tungstenite::Message;

const SECRET: &str = "http-test-secret";
const ISSUER: &str = "https://issuer.example.com";
const AUDIENCE: &str = "spire-api";

#[derive(Debug, Deserialize)]
struct HelloRequest {
    name: String,
}

#[derive(Debug, Serialize)]
struct HelloResponse {
    message: String,
}

struct HelloOperation;

impl Operation<HelloRequest, HelloResponse> for HelloOperation {
    async fn handle(
        &self,
        _ctx: &RequestContext,
        request: HelloRequest,
    ) -> DispatchResult<HelloResponse> {
        Ok(HelloResponse {
            message: format!("Hello, {}!", request.name),
        })
    }
}

struct HelloStreamOperation;

impl StreamOperation<Empty> for HelloStreamOperation {
    async fn stream(
        &self,
        _ctx: &RequestContext,
        _request: Empty,
        _cancel: CancelToken,
    ) -> DispatchResult<ValueStream> {
        Ok(futures_util::stream::iter("Hello, World!".chars())
            .map(|c| Ok(json!({ "char": c.to_string() })))
            .boxed())
    }
}

async fn start_server() -> (
    SocketAddr,
    ShutdownSignal,
    JoinHandle<Result<(), ServerError>>,
) {
    let registry = RegistryBuilder::new()
        .operation(OperationEntry::unary(
            "/hello",
            HttpMethod::Post,
            "greetings",
            AuthPolicy::None,
            HelloOperation,
        ))
        .operation(OperationEntry::unary(
            "/hello/secure",
            HttpMethod::Post,
            "greetings",
            AuthPolicy::User,
            HelloOperation,
        ))
        .operation(OperationEntry::stream(
            "/hello/stream",
            HttpMethod::Post,
            "greetings",
            AuthPolicy::None,
            HelloStreamOperation,
        ))
        .build()
        .expect("no duplicates");

    let mut config = SpireConfig::default();
    config.server.body_limit_bytes = 1024;
    config.auth.hmac_secret = Some(SECRET.to_string());
    config.auth.issuer = ISSUER.to_string();
    config.auth.audience = AUDIENCE.to_string();

    let server = Server::from_config(&config, registry).expect("server builds");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let shutdown = ShutdownSignal::new();
    let handle = tokio::spawn(server.serve(listener, shutdown.clone()));
    (addr, shutdown, handle)
}

async fn send(
    addr: SocketAddr,
    request: Request<Full<Bytes>>,
) -> http::Response<hyper::body::Incoming> {
    let stream = TcpStream::connect(addr).await.expect("connect");
    let (mut sender, connection) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
        .await
        .expect("handshake");
    tokio::spawn(async move {
        let _ = connection.await;
    });
    sender.send_request(request).await.expect("response")
}

fn post(path: &str, body: impl Into<Bytes>) -> Request<Full<Bytes>> {
    Request::builder()
        .method("POST")
        .uri(path)
        .header(HOST, "localhost")
        .header(CONTENT_TYPE, "application/json")
        .body(Full::new(body.into()))
        .expect("request builds")
}

fn get(path: &str) -> Request<Full<Bytes>> {
    Request::builder()
        .uri(path)
        .header(HOST, "localhost")
        .body(Full::new(Bytes::new()))
        .expect("request builds")
}

async fn body_json(response: http::Response<hyper::body::Incoming>) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body collects")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("body is JSON")
}

fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock before epoch")
        .as_secs()
}

fn user_token(sub: &str) -> String {
    let token = encode(
        &Header::default(),
        &json!({
            "iss": ISSUER,
            "aud": AUDIENCE,
            "exp": now() + 3600,
            "sub": sub,
        }),
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .expect("signing should work");
    format!("Bearer {token}")
}

// ==================== Unary Tests ====================

#[tokio::test]
async fn test_healthz_reports_ok() {
    let (addr, _shutdown, _handle) = start_server().await;
    let response = send(addr, get("/healthz")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let value = body_json(response).await;
    assert_eq!(value["status"], "ok");
}

#[tokio::test]
async fn test_unary_round_trip() {
    let (addr, _shutdown, _handle) = start_server().await;
    let response = send(addr, post("/hello", r#"{"name":"Spire"}"#)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let value = body_json(response).await;
    assert_eq!(value["message"], "Hello, Spire!");
}

#[tokio::test]
async fn test_unknown_route_is_a_404_envelope() {
    let (addr, _shutdown, _handle) = start_server().await;
    let response = send(addr, post("/nope", "{}")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let value = body_json(response).await;
    assert_eq!(value["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_secured_route_requires_a_token() {
    let (addr, _shutdown, _handle) = start_server().await;

    let response = send(addr, post("/hello/secure", r#"{"name":"x"}"#)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let mut request = post("/hello/secure", r#"{"name":"Ada"}"#);
    request.headers_mut().insert(
        AUTHORIZATION,
        user_token("user-1").parse().expect("header value"),
    );
    let response = send(addr, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    let value = body_json(response).await;
    assert_eq!(value["message"], "Hello, Ada!");
}

#[tokio::test]
async fn test_oversized_body_is_rejected_with_413() {
    let (addr, _shutdown, _handle) = start_server().await;
    let oversized = vec![b'x'; 4096];
    let response = send(addr, post("/hello", oversized)).await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let value = body_json(response).await;
    assert_eq!(value["error"]["code"], "PAYLOAD_TOO_LARGE");
}

#[tokio::test]
async fn test_openapi_lists_registered_routes() {
    let (addr, _shutdown, _handle) = start_server().await;
    let response = send(addr, get("/openapi.json")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let value = body_json(response).await;
    assert!(value["paths"]["/hello"]["post"].is_object());
    assert_eq!(
        value["paths"]["/hello/stream"]["post"]["x-stream"],
        Value::Bool(true)
    );
}

#[tokio::test]
async fn test_docs_page_is_served() {
    let (addr, _shutdown, _handle) = start_server().await;
    let response = send(addr, get("/docs")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body collects")
        .to_bytes();
    assert!(std::str::from_utf8(&bytes)
        .expect("utf-8")
        .contains("swagger-ui"));
}

// ==================== Streaming Tests ====================

#[tokio::test]
async fn test_stream_emits_ndjson_frames_then_end() {
    let (addr, _shutdown, _handle) = start_server().await;
    let response = send(addr, post("/hello/stream", "{}")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(CONTENT_TYPE).expect("content type"),
        "application/x-ndjson"
    );

    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body collects")
        .to_bytes();
    let text = std::str::from_utf8(&bytes).expect("utf-8");
    let lines: Vec<Value> = text
        .lines()
        .map(|line| serde_json::from_str(line).expect("JSON line"))
        .collect();

    assert_eq!(lines.len(), 14);
    assert_eq!(lines[0]["type"], "data");
    assert_eq!(lines[0]["data"]["char"], "H");
    assert_eq!(lines[12]["data"]["char"], "!");
    assert_eq!(lines[13]["type"], "end");
}

#[tokio::test]
async fn test_stream_honors_sse_accept_header() {
    let (addr, _shutdown, _handle) = start_server().await;
    let mut request = post("/hello/stream", "{}");
    request
        .headers_mut()
        .insert(ACCEPT, "text/event-stream".parse().expect("header value"));
    let response = send(addr, request).await;
    assert_eq!(
        response.headers().get(CONTENT_TYPE).expect("content type"),
        "text/event-stream"
    );

    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body collects")
        .to_bytes();
    let text = std::str::from_utf8(&bytes).expect("utf-8");
    assert!(text.starts_with("data: "));
    assert!(text.contains(r#""type":"end""#));
}

// ==================== WebSocket Tests ====================

#[tokio::test]
async fn test_websocket_stream_over_the_operations_namespace() {
    let (addr, _shutdown, _handle) = start_server().await;
    let stream = TcpStream::connect(addr).await.expect("connect");
    let (mut socket, response) =
        tokio_tungstenite::client_async(format!("ws://{addr}/ws/operations"), stream)
            .await
            .expect("upgrade");
    assert_eq!(response.status(), StatusCode::SWITCHING_PROTOCOLS);

    let start = json!({
        "type": "start",
        "requestId": "ws-1",
        "route": "/hello/stream",
        "method": "POST",
        "input": {},
    });
    socket
        .send(Message::text(start.to_string()))
        .await
        .expect("send start");

    let mut chars = String::new();
    loop {
        let message = tokio::time::timeout(Duration::from_secs(5), socket.next())
            .await
            .expect("message within timeout")
            .expect("socket open")
            .expect("no transport error");
        let Message::Text(text) = message else {
            continue;
        };
        let value: Value = serde_json::from_str(text.as_str()).expect("JSON message");
        assert_eq!(value["requestId"], "ws-1");
        match value["type"].as_str().expect("type tag") {
            "frame" => chars.push_str(value["frame"]["data"]["char"].as_str().expect("char")),
            "end" => break,
            other => panic!("unexpected message type {other}"),
        }
    }
    assert_eq!(chars, "Hello, World!");
}

#[tokio::test]
async fn test_plain_request_to_ws_route_is_rejected() {
    let (addr, _shutdown, _handle) = start_server().await;
    let response = send(addr, get("/ws/operations")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let value = body_json(response).await;
    assert_eq!(value["error"]["code"], "BAD_REQUEST");
}

// ==================== Shutdown Tests ====================

#[tokio::test]
async fn test_shutdown_stops_the_accept_loop() {
    let (addr, shutdown, handle) = start_server().await;

    // The server is live before the trigger.
    let response = send(addr, get("/healthz")).await;
    assert_eq!(response.status(), StatusCode::OK);

    shutdown.trigger();
    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("server exits")
        .expect("task does not panic");
    assert!(result.is_ok());
}
