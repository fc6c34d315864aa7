//! Cooperative cancellation.
//!
//! Cancellation never interrupts a running computation. A
//! [`CancelToken`] is a flag that blocking primitives poll at their
//! suspension points and that long computations must poll explicitly;
//! code that neither blocks nor polls runs to completion.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// How long an interruptible wait sleeps between cancellation polls.
pub(crate) const CANCEL_POLL: Duration = Duration::from_millis(5);

/// A cloneable cancellation flag shared between a controller and any
/// number of workers.
///
/// # Examples
///
/// ```
/// use synckit_primitives::CancelToken;
///
/// let token = CancelToken::new();
/// let worker_token = token.clone();
///
/// assert!(!worker_token.is_cancelled());
/// token.cancel();
/// assert!(worker_token.is_cancelled());
/// ```
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

#[derive(Debug, Default)]
struct CancelInner {
    flag: AtomicBool,
    gate: Mutex<()>,
    changed: Condvar,
}

impl CancelToken {
    /// Creates a fresh, un-cancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation and wakes any thread blocked in
    /// [`wait_timeout`](CancelToken::wait_timeout).
    ///
    /// Idempotent; only the first call has any effect.
    pub fn cancel(&self) {
        if self.inner.flag.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::trace!("cancellation requested");
        let _gate = self
            .inner
            .gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.inner.changed.notify_all();
    }

    /// Whether cancellation has been requested.
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.flag.load(Ordering::SeqCst)
    }

    /// Blocks the calling thread for up to `timeout`, returning early
    /// when cancellation arrives.
    ///
    /// Returns `true` when the token was cancelled, `false` when the
    /// full timeout elapsed first. This is the pacing primitive behind
    /// periodic work: wait one interval, run, repeat until cancelled.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut gate = self
            .inner
            .gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        loop {
            if self.is_cancelled() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (reacquired, _outcome) = self
                .inner
                .changed
                .wait_timeout(gate, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            gate = reacquired;
        }
    }
}
