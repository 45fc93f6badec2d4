//! Binding a session to an upgraded socket.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use spire_dispatch::Dispatcher;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_tungstenite::WebSocketStream;
use tracing::debug;
use tungstenite::Message;

use crate::error::{WsError, WsResult};
use crate::session::Session;

/// Outbound messages buffered per socket before stream producers block.
const OUTBOUND_BUFFER: usize = 64;

/// Drives one upgraded WebSocket until the peer disconnects.
///
/// Incoming text messages feed the [`Session`]; server messages produced by
/// its streams are written back in arrival order. Pings are answered with
/// pongs; binary messages are ignored. When the socket closes, every stream
/// still in flight on the session is torn down.
///
/// # Errors
///
/// Returns the transport error that ended the session, if any. A clean close
/// from the peer is `Ok`.
pub async fn drive_socket<S>(
    socket: WebSocketStream<S>,
    dispatcher: Arc<Dispatcher>,
    authorization: Option<String>,
) -> WsResult<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::channel(OUTBOUND_BUFFER);
    let mut session = Session::new(dispatcher, authorization, tx);

    let result = loop {
        tokio::select! {
            outgoing = rx.recv() => match outgoing {
                Some(message) => {
                    let text = match serde_json::to_string(&message) {
                        Ok(text) => text,
                        Err(error) => break Err(WsError::Encode(error)),
                    };
                    if let Err(error) = sink.send(Message::text(text)).await {
                        break Err(WsError::Transport(error));
                    }
                }
                None => break Ok(()),
            },
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Text(text))) => session.handle_text(text.as_str()).await,
                Some(Ok(Message::Ping(payload))) => {
                    if let Err(error) = sink.send(Message::Pong(payload)).await {
                        break Err(WsError::Transport(error));
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    debug!("WebSocket peer closed the session");
                    break Ok(());
                }
                Some(Ok(_)) => {}
                Some(Err(error)) => break Err(WsError::Transport(error)),
            },
        }
    };

    session.shutdown().await;
    result
}
