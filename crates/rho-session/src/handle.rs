//! A cloneable handle for stopping an exchange from outside the session.

use parking_lot::Mutex;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use tokio_util::sync::CancellationToken;

/// A cloneable handle for poking the session from external code.
///
/// All fields are `Arc`-wrapped, so cloning is cheap.
#[derive(Clone)]
pub struct SessionHandle {
    pub(crate) cancel: Arc<Mutex<CancellationToken>>,
    pub(crate) in_flight: Arc<AtomicBool>,
    pub(crate) idle_notify: Arc<tokio::sync::Notify>,
}

impl SessionHandle {
    pub(crate) fn new() -> Self {
        Self {
            cancel: Arc::new(Mutex::new(CancellationToken::new())),
            in_flight: Arc::new(AtomicBool::new(false)),
            idle_notify: Arc::new(tokio::sync::Notify::new()),
        }
    }

    /// Mark an exchange as started and hand out its token, scoped to `parent`.
    /// Returns `None` if one is already in flight.
    pub(crate) fn begin_exchange(&self, parent: &CancellationToken) -> Option<CancellationToken> {
        let mut cancel = self.cancel.lock();
        if self.in_flight.load(Ordering::Acquire) {
            return None;
        }
        *cancel = parent.child_token();
        self.in_flight.store(true, Ordering::Release);
        Some(cancel.clone())
    }

    /// Mark the current exchange as finished and wake idle waiters
    pub(crate) fn end_exchange(&self) {
        {
            let _cancel = self.cancel.lock();
            self.in_flight.store(false, Ordering::Release);
        }
        self.idle_notify.notify_waiters();
    }

    /// Stop the exchange in flight. Returns `false` if there was none.
    pub fn stop(&self) -> bool {
        let cancel = self.cancel.lock();
        if !self.in_flight.load(Ordering::Acquire) {
            return false;
        }
        tracing::debug!("Stopping exchange in flight");
        cancel.cancel();
        true
    }

    /// Whether an exchange is in flight.
    pub fn is_streaming(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Wait until no exchange is in flight.
    pub async fn wait_for_idle(&self) {
        let notified = self.idle_notify.notified();
        if !self.in_flight.load(Ordering::Acquire) {
            return;
        }
        notified.await;
    }

    /// Wait until idle, with a timeout.
    /// Returns `true` if idle was reached, `false` on timeout.
    pub async fn wait_for_idle_timeout(&self, timeout: std::time::Duration) -> bool {
        if !self.is_streaming() {
            return true;
        }
        tokio::time::timeout(timeout, self.wait_for_idle())
            .await
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_without_exchange_is_noop() {
        let handle = SessionHandle::new();
        assert!(!handle.stop());
        assert!(!handle.is_streaming());
    }

    #[test]
    fn test_single_exchange_at_a_time() {
        let root = CancellationToken::new();
        let handle = SessionHandle::new();
        let token = handle.begin_exchange(&root).unwrap();
        assert!(handle.is_streaming());
        assert!(handle.begin_exchange(&root).is_none());

        assert!(handle.stop());
        assert!(token.is_cancelled());
        assert!(!root.is_cancelled());

        handle.end_exchange();
        assert!(!handle.is_streaming());
        let next = handle.begin_exchange(&root).unwrap();
        assert!(!next.is_cancelled());
    }

    #[test]
    fn test_parent_cancel_reaches_exchange() {
        let root = CancellationToken::new();
        let handle = SessionHandle::new();
        let token = handle.begin_exchange(&root).unwrap();
        root.cancel();
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_wait_for_idle_when_idle() {
        let handle = SessionHandle::new();
        assert!(
            handle
                .wait_for_idle_timeout(std::time::Duration::from_millis(10))
                .await
        );
    }
}
