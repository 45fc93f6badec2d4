//! Cooperative stream cancellation.
//!
//! This module provides the [`CancelRegistry`], a concurrent map of in-flight
//! streams keyed by the client-supplied request ID, together with the
//! [`CancelHandle`]/[`CancelToken`] pair each stream is driven with.
//!
//! Cancellation is cooperative: producers observe the token between frames
//! and stop promptly after it fires. The registry holds at most one live
//! handle per request ID at any time.

use dashmap::DashMap;
use tokio::sync::watch;
use tracing::debug;

/// Creates a connected cancellation pair.
///
/// The [`CancelHandle`] side triggers cancellation (held by the registry);
/// the [`CancelToken`] side observes it (held by the producing stream).
#[must_use]
pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelToken { rx })
}

/// The triggering side of a cancellation pair.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    /// Fires the cancellation signal.
    ///
    /// Idempotent; observers that already stopped are unaffected.
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }

    /// Returns `true` if the signal has fired.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

/// The observing side of a cancellation pair.
///
/// Clonable so a stream driver and its producer can both watch the same
/// signal.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    /// Returns `true` if cancellation has fired.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Waits until cancellation fires.
    ///
    /// If the handle is dropped without firing (natural stream completion),
    /// this future stays pending forever; callers race it against their own
    /// completion with `select!`.
    pub async fn cancelled(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }

    /// Creates a token that never fires, for operations driven outside a
    /// registry (tests, unary-over-stream adaptation).
    #[must_use]
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }
}

/// A concurrent registry of in-flight streams keyed by request ID.
///
/// Backed by a sharded concurrent map; there is no coarse global lock, and
/// at most one live handle exists per request ID at any time.
///
/// # Example
///
/// ```
/// use spire_stream::{cancel_pair, CancelRegistry};
///
/// let registry = CancelRegistry::new();
/// let (handle, _token) = cancel_pair();
///
/// assert!(registry.try_register("req-1", handle));
/// assert!(registry.is_registered("req-1"));
/// assert!(registry.cancel("req-1"));
/// assert!(!registry.is_registered("req-1"));
/// ```
#[derive(Debug, Default)]
pub struct CancelRegistry {
    streams: DashMap<String, CancelHandle>,
}

impl CancelRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handle for a request ID.
    ///
    /// Returns `false` without touching the existing entry when a live
    /// handle is already registered for `request_id`.
    pub fn try_register(&self, request_id: impl Into<String>, handle: CancelHandle) -> bool {
        let request_id = request_id.into();
        match self.streams.entry(request_id) {
            dashmap::mapref::entry::Entry::Occupied(_) => false,
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                debug!(request_id = %entry.key(), "Stream registered");
                entry.insert(handle);
                true
            }
        }
    }

    /// Creates a pair, registers the handle, and returns the token.
    ///
    /// Returns `None` when `request_id` is already registered.
    pub fn register(&self, request_id: impl Into<String>) -> Option<CancelToken> {
        let (handle, token) = cancel_pair();
        if self.try_register(request_id, handle) {
            Some(token)
        } else {
            None
        }
    }

    /// Cancels and removes the stream for a request ID.
    ///
    /// Returns `true` iff a live stream was actually cancelled; an unknown
    /// ID is a no-op returning `false`.
    pub fn cancel(&self, request_id: &str) -> bool {
        match self.streams.remove(request_id) {
            Some((_, handle)) => {
                handle.cancel();
                debug!(request_id = %request_id, "Stream cancelled");
                true
            }
            None => false,
        }
    }

    /// Removes the entry for a request ID without cancelling.
    ///
    /// Idempotent; used on natural stream completion.
    pub fn remove(&self, request_id: &str) {
        if self.streams.remove(request_id).is_some() {
            debug!(request_id = %request_id, "Stream removed");
        }
    }

    /// Returns `true` if a live stream is registered for the request ID.
    #[must_use]
    pub fn is_registered(&self, request_id: &str) -> bool {
        self.streams.contains_key(request_id)
    }

    /// Returns the number of in-flight streams.
    #[must_use]
    pub fn len(&self) -> usize {
        self.streams.len()
    }

    /// Returns `true` if no streams are in flight.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_try_register_rejects_duplicates() {
        let registry = CancelRegistry::new();
        let (first, first_token) = cancel_pair();
        let (second, _second_token) = cancel_pair();

        assert!(registry.try_register("req-1", first));
        assert!(!registry.try_register("req-1", second));

        // The first registration is intact: cancelling through the registry
        // fires the first token.
        assert!(registry.cancel("req-1"));
        assert!(first_token.is_cancelled());
    }

    #[test]
    fn test_cancel_unknown_id_is_noop() {
        let registry = CancelRegistry::new();
        assert!(!registry.cancel("missing"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_remove_is_idempotent_and_does_not_cancel() {
        let registry = CancelRegistry::new();
        let (handle, token) = cancel_pair();
        assert!(registry.try_register("req-1", handle));

        registry.remove("req-1");
        registry.remove("req-1");

        assert!(!registry.is_registered("req-1"));
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_id_reusable_after_removal() {
        let registry = CancelRegistry::new();
        let (first, _t1) = cancel_pair();
        assert!(registry.try_register("req-1", first));
        registry.remove("req-1");

        let (second, _t2) = cancel_pair();
        assert!(registry.try_register("req-1", second));
    }

    #[tokio::test]
    async fn test_token_observes_cancellation() {
        let (handle, mut token) = cancel_pair();
        assert!(!token.is_cancelled());

        handle.cancel();
        token.cancelled().await;
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_pends_when_handle_dropped() {
        let (handle, mut token) = cancel_pair();
        drop(handle);

        let waited = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            token.cancelled(),
        )
        .await;
        assert!(waited.is_err(), "token must stay pending without a cancel");
        assert!(!token.is_cancelled());
    }

    #[tokio::test]
    async fn test_cloned_tokens_share_the_signal() {
        let (handle, token) = cancel_pair();
        let mut clone = token.clone();
        handle.cancel();
        clone.cancelled().await;
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_never_token() {
        let token = CancelToken::never();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_concurrent_registration_admits_exactly_one() {
        let registry = std::sync::Arc::new(CancelRegistry::new());
        let mut joins = Vec::new();
        for _ in 0..8 {
            let registry = registry.clone();
            joins.push(std::thread::spawn(move || {
                let (handle, _token) = cancel_pair();
                registry.try_register("req-1", handle)
            }));
        }
        let admitted = joins
            .into_iter()
            .map(|j| j.join().expect("thread should not panic"))
            .filter(|admitted| *admitted)
            .count();
        assert_eq!(admitted, 1);
        assert_eq!(registry.len(), 1);
    }

    proptest! {
        // Any interleaving of register/cancel/remove for one id keeps the
        // registry consistent: at most one live entry, cancel true only
        // when an entry existed.
        #[test]
        fn prop_registry_sequences_stay_consistent(ops in proptest::collection::vec(0u8..3, 1..32)) {
            let registry = CancelRegistry::new();
            let mut live = false;
            for op in ops {
                match op {
                    0 => {
                        let (handle, _token) = cancel_pair();
                        let admitted = registry.try_register("req", handle);
                        prop_assert_eq!(admitted, !live);
                        live = true;
                    }
                    1 => {
                        let cancelled = registry.cancel("req");
                        prop_assert_eq!(cancelled, live);
                        live = false;
                    }
                    _ => {
                        registry.remove("req");
                        live = false;
                    }
                }
                prop_assert_eq!(registry.is_registered("req"), live);
            }
        }
    }
}
