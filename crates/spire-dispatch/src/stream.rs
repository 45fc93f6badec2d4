//! Frame production for streaming dispatch.
//!
//! [`frame_stream`] wraps an operation's item stream into a stream of wire
//! [`Frame`]s. Every path through the wrapper closes the stream with exactly
//! one terminal frame and exactly one terminal log event, and removes the
//! stream's cancellation handle from the registry: normal completion emits
//! [`Frame::End`], an item error emits [`Frame::Error`] with the client-safe
//! message, external cancellation emits [`Frame::Cancelled`], and a consumer
//! that drops the stream early is handled by the guard's `Drop`.

use std::sync::Arc;
use std::time::Instant;

use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use spire_stream::{CancelRegistry, CancelToken, Frame, ValueStream};
use tracing::{error, info, warn};

/// A stream of wire frames, closed by exactly one terminal frame.
pub type FrameStream = BoxStream<'static, Frame>;

/// Cleanup guard for one in-flight stream.
///
/// The guard owns the registry entry for the stream's id. `finish` runs at
/// most once; if the consumer drops the frame stream before a terminal frame
/// is produced, `Drop` finishes the stream as aborted.
pub(crate) struct StreamGuard {
    stream_id: String,
    operation: String,
    user_id: String,
    cancellations: Arc<CancelRegistry>,
    started: Instant,
    terminal: bool,
}

impl StreamGuard {
    pub(crate) fn new(
        stream_id: impl Into<String>,
        operation: impl Into<String>,
        user_id: impl Into<String>,
        cancellations: Arc<CancelRegistry>,
    ) -> Self {
        Self {
            stream_id: stream_id.into(),
            operation: operation.into(),
            user_id: user_id.into(),
            cancellations,
            started: Instant::now(),
            terminal: false,
        }
    }

    fn finish(&mut self, completed: bool, reason: &'static str) {
        if self.terminal {
            return;
        }
        self.terminal = true;
        self.cancellations.remove(&self.stream_id);
        let elapsed_ms = u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX);
        if completed {
            info!(
                operation = %self.operation,
                user_id = %self.user_id,
                stream_id = %self.stream_id,
                elapsed_ms,
                "Stream completed"
            );
        } else {
            warn!(
                operation = %self.operation,
                user_id = %self.user_id,
                stream_id = %self.stream_id,
                elapsed_ms,
                reason,
                "Stream aborted"
            );
        }
    }
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.finish(false, "consumer disconnected");
    }
}

struct StreamState {
    inner: ValueStream,
    cancel: CancelToken,
    guard: StreamGuard,
    finished: bool,
}

/// Wraps an operation's item stream into a terminated frame stream.
///
/// Cancellation is observed cooperatively between items; once the token has
/// fired no further data frames are forwarded.
pub(crate) fn frame_stream(
    inner: ValueStream,
    cancel: CancelToken,
    guard: StreamGuard,
) -> FrameStream {
    let state = StreamState {
        inner,
        cancel,
        guard,
        finished: false,
    };

    futures_util::stream::unfold(state, |mut state| async move {
        if state.finished {
            return None;
        }

        let frame = tokio::select! {
            biased;

            () = state.cancel.cancelled() => {
                state.finished = true;
                state.guard.finish(false, "cancelled by caller");
                Frame::Cancelled
            }

            item = state.inner.next() => match item {
                Some(Ok(value)) => Frame::data(value),
                Some(Err(fault)) => {
                    state.finished = true;
                    error!(
                        operation = %state.guard.operation,
                        stream_id = %state.guard.stream_id,
                        error = %fault,
                        "Stream item production failed"
                    );
                    state.guard.finish(false, "item error");
                    Frame::error(fault.client_message())
                }
                None => {
                    state.finished = true;
                    state.guard.finish(true, "completed");
                    Frame::End
                }
            },
        };

        Some((frame, state))
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use spire_core::DispatchError;

    fn guard(registry: &Arc<CancelRegistry>, id: &str) -> StreamGuard {
        StreamGuard::new(id, "/test", "user:tester", Arc::clone(registry))
    }

    #[tokio::test]
    async fn test_normal_completion_emits_end_and_cleans_up() {
        let registry = Arc::new(CancelRegistry::new());
        let token = registry.register("s-1").expect("fresh id");

        let inner = futures_util::stream::iter(vec![Ok(json!(1)), Ok(json!(2))]).boxed();
        let mut frames = frame_stream(inner, token, guard(&registry, "s-1"));

        assert_eq!(frames.next().await, Some(Frame::data(json!(1))));
        assert_eq!(frames.next().await, Some(Frame::data(json!(2))));
        assert_eq!(frames.next().await, Some(Frame::End));
        assert_eq!(frames.next().await, None);
        assert!(!registry.is_registered("s-1"));
    }

    #[tokio::test]
    async fn test_item_error_emits_client_safe_error_frame() {
        let registry = Arc::new(CancelRegistry::new());
        let token = registry.register("s-2").expect("fresh id");

        let inner = futures_util::stream::iter(vec![
            Ok(json!("a")),
            Err(DispatchError::handler("db connection dropped")),
        ])
        .boxed();
        let mut frames = frame_stream(inner, token, guard(&registry, "s-2"));

        assert_eq!(frames.next().await, Some(Frame::data(json!("a"))));
        match frames.next().await {
            Some(Frame::Error { message }) => {
                assert_eq!(message, "The request could not be processed.");
            }
            other => panic!("expected error frame, got {other:?}"),
        }
        assert_eq!(frames.next().await, None);
        assert!(!registry.is_registered("s-2"));
    }

    #[tokio::test]
    async fn test_cancellation_stops_data_frames() {
        let registry = Arc::new(CancelRegistry::new());
        let token = registry.register("s-3").expect("fresh id");

        let inner = futures_util::stream::repeat(json!(0)).map(Ok).boxed();
        let mut frames = frame_stream(inner, token, guard(&registry, "s-3"));

        assert_eq!(frames.next().await, Some(Frame::data(json!(0))));
        assert!(registry.cancel("s-3"));
        assert_eq!(frames.next().await, Some(Frame::Cancelled));
        assert_eq!(frames.next().await, None);
        assert!(!registry.is_registered("s-3"));
    }

    #[tokio::test]
    async fn test_dropping_the_stream_releases_the_registry_entry() {
        let registry = Arc::new(CancelRegistry::new());
        let token = registry.register("s-4").expect("fresh id");

        let inner = futures_util::stream::repeat(json!(0)).map(Ok).boxed();
        let frames = frame_stream(inner, token, guard(&registry, "s-4"));
        assert!(registry.is_registered("s-4"));

        drop(frames);
        assert!(!registry.is_registered("s-4"));
    }
}
