//! Per-socket session state.

use std::sync::Arc;

use bytes::Bytes;
use futures_util::StreamExt;
use spire_dispatch::Dispatcher;
use spire_registry::HttpMethod;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::debug;

use crate::protocol::{ClientMessage, ServerMessage};

/// One WebSocket session.
///
/// A session multiplexes any number of concurrent streams over one socket.
/// Every `start` spawns a forwarder task that pumps the stream's frames into
/// the session's outbound channel tagged with the client's `requestId`; the
/// socket writer on the other end serializes them in arrival order.
///
/// The caller's identity is resolved once, from the `Authorization` header
/// presented at upgrade time, and applies to every stream started on the
/// session.
pub struct Session {
    dispatcher: Arc<Dispatcher>,
    authorization: Option<String>,
    outbound: mpsc::Sender<ServerMessage>,
    forwarders: JoinSet<()>,
}

impl Session {
    /// Creates a session writing server messages to `outbound`.
    #[must_use]
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        authorization: Option<String>,
        outbound: mpsc::Sender<ServerMessage>,
    ) -> Self {
        Self {
            dispatcher,
            authorization,
            outbound,
            forwarders: JoinSet::new(),
        }
    }

    /// Returns the number of forwarder tasks spawned and not yet reaped.
    #[must_use]
    pub fn forwarder_count(&self) -> usize {
        self.forwarders.len()
    }

    /// Handles one incoming text message.
    ///
    /// Unparseable messages are answered with an `error` message whose
    /// `requestId` is empty; everything else is routed by message type.
    pub async fn handle_text(&mut self, text: &str) {
        let message: ClientMessage = match serde_json::from_str(text) {
            Ok(message) => message,
            Err(error) => {
                self.send(ServerMessage::Error {
                    request_id: String::new(),
                    message: format!("Malformed client message: {error}"),
                })
                .await;
                return;
            }
        };

        match message {
            ClientMessage::Start {
                request_id,
                route,
                method,
                input,
            } => self.start(request_id, &route, &method, input).await,
            ClientMessage::Cancel { request_id } => self.cancel(&request_id),
        }
    }

    /// Starts a stream and spawns its forwarder.
    async fn start(
        &mut self,
        request_id: String,
        route: &str,
        method: &str,
        input: serde_json::Value,
    ) {
        let Some(method) = HttpMethod::parse(method) else {
            self.send(ServerMessage::Error {
                request_id,
                message: format!("Unsupported method: {method}"),
            })
            .await;
            return;
        };

        let Some(entry) = self.dispatcher.registry().lookup(method, route) else {
            self.send(ServerMessage::Error {
                request_id,
                message: format!("No operation at {method} {route}"),
            })
            .await;
            return;
        };

        let body = if input.is_null() {
            Bytes::new()
        } else {
            Bytes::from(serde_json::to_vec(&input).unwrap_or_default())
        };

        match self
            .dispatcher
            .dispatch_stream(entry, self.authorization.as_deref(), body, &request_id)
            .await
        {
            Ok(mut frames) => {
                let outbound = self.outbound.clone();
                self.forwarders.spawn(async move {
                    while let Some(frame) = frames.next().await {
                        let message = ServerMessage::from_frame(request_id.clone(), frame);
                        if outbound.send(message).await.is_err() {
                            break;
                        }
                    }
                });
            }
            Err(fault) => {
                self.send(ServerMessage::Error {
                    request_id,
                    message: fault.client_message(),
                })
                .await;
            }
        }
    }

    /// Triggers cancellation for one of the session's streams.
    ///
    /// The forwarder emits the terminal `cancelled` message once the stream
    /// observes the token; cancelling an unknown or finished id is a no-op.
    fn cancel(&self, request_id: &str) {
        if !self.dispatcher.cancellations().cancel(request_id) {
            debug!(request_id, "Cancel for unknown or finished stream ignored");
        }
    }

    /// Tears the session down, aborting every in-flight stream.
    ///
    /// Aborting a forwarder drops its frame stream, which releases the
    /// stream's cancellation registration and emits its terminal log event.
    pub async fn shutdown(&mut self) {
        self.forwarders.abort_all();
        while self.forwarders.join_next().await.is_some() {}
    }

    async fn send(&self, message: ServerMessage) {
        // A closed channel means the socket writer is gone; the session is
        // being torn down anyway.
        let _ = self.outbound.send(message).await;
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("authenticated", &self.authorization.is_some())
            .field("forwarders", &self.forwarders.len())
            .finish_non_exhaustive()
    }
}
