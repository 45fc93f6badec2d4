//! RFC 6455 WebSocket handshake.

use base64::Engine;
use bytes::Bytes;
use http::header::{CONNECTION, UPGRADE};
use http::{HeaderMap, Response, StatusCode};
use http_body_util::{BodyExt, Full};
use sha1::{Digest, Sha1};

use crate::gateway::ResponseBody;

/// GUID appended to the client key when deriving `Sec-WebSocket-Accept`.
const WEBSOCKET_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Validates the handshake headers and returns the accept key.
///
/// # Errors
///
/// Returns a short reason naming the first missing or invalid header.
pub(crate) fn validate_upgrade(headers: &HeaderMap) -> Result<String, &'static str> {
    let connection_upgrades = headers
        .get(CONNECTION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.to_lowercase().contains("upgrade"));
    if !connection_upgrades {
        return Err("missing Connection: Upgrade header");
    }

    let upgrades_to_websocket = headers
        .get(UPGRADE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("websocket"));
    if !upgrades_to_websocket {
        return Err("missing Upgrade: websocket header");
    }

    let version_13 = headers
        .get("sec-websocket-version")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == "13");
    if !version_13 {
        return Err("Sec-WebSocket-Version must be 13");
    }

    headers
        .get("sec-websocket-key")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(accept_key)
        .ok_or("missing Sec-WebSocket-Key header")
}

/// Derives the `Sec-WebSocket-Accept` value from the client key.
fn accept_key(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(WEBSOCKET_GUID.as_bytes());
    base64::engine::general_purpose::STANDARD.encode(hasher.finalize())
}

/// Builds the `101 Switching Protocols` response.
pub(crate) fn switching_protocols(accept: &str) -> Response<ResponseBody> {
    Response::builder()
        .status(StatusCode::SWITCHING_PROTOCOLS)
        .header(CONNECTION, "Upgrade")
        .header(UPGRADE, "websocket")
        .header("Sec-WebSocket-Accept", accept)
        .body(Full::new(Bytes::new()).boxed_unsync())
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::new()).boxed_unsync()))
}
