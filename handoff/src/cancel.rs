//! Cancellation signals observed by blocking queue operations.
//!
//! Two independent sources can end a blocking wait early:
//!
//! - [`ShutdownSignal`] - the process-wide "host is terminating" flag.
//!   Every blocking operation polls it; there is no way to opt out.
//! - [`CancelToken`] - a per-call token supplied by the caller to abort
//!   one specific wait.
//!
//! Both are cloneable handles to a shared atomic flag, so the side that
//! raises the signal and the side that observes it can live on different
//! threads without further coordination. Neither signal can be un-set:
//! once raised it stays raised for the lifetime of the handle set.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Process-wide shutdown request, polled by every blocking queue operation.
///
/// Clones share the same underlying flag. The host creates one signal at
/// startup, hands clones to its worker threads, and calls [`raise`] once
/// during teardown; any thread blocked in a queue operation returns with
/// [`Cancelled::Shutdown`](crate::queue::Cancelled::Shutdown) within one
/// poll interval.
///
/// [`raise`]: ShutdownSignal::raise
#[derive(Clone, Debug, Default)]
pub struct ShutdownSignal {
    flag: Arc<AtomicBool>,
}

impl ShutdownSignal {
    /// Creates a signal in the not-raised state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Raises the signal. There is no way to lower it again.
    pub fn raise(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Returns `true` once the signal has been raised.
    ///
    /// Relaxed load: the flag is advisory and the queue's poll interval
    /// bounds how stale an observation can be.
    #[must_use]
    pub fn is_raised(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Per-call cancellation token for aborting a single blocking wait.
///
/// The caller keeps one clone and passes another (by reference) into
/// `push`/`pop`/`peek`. Cancelling from any thread ends the wait with
/// [`Cancelled::Token`](crate::queue::Cancelled::Token).
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates a token in the not-cancelled state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Cancels the token. There is no way to reset it.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Returns `true` once the token has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shutdown_starts_lowered() {
        let shutdown = ShutdownSignal::new();
        assert!(!shutdown.is_raised());
        shutdown.raise();
        assert!(shutdown.is_raised());
    }

    #[test]
    fn test_clones_share_the_flag() {
        let shutdown = ShutdownSignal::new();
        let observer = shutdown.clone();
        shutdown.raise();
        assert!(observer.is_raised());

        let token = CancelToken::new();
        let observer = token.clone();
        assert!(!observer.is_cancelled());
        token.cancel();
        assert!(observer.is_cancelled());
    }

    #[test]
    fn test_raise_is_visible_across_threads() {
        let token = CancelToken::new();
        let remote = token.clone();
        std::thread::spawn(move || remote.cancel()).join().unwrap();
        assert!(token.is_cancelled());
    }
}
