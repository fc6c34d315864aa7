//! Condition variable bound to an [`ExclusiveLock`].
//!
//! A [`ConditionVariable`] is created against exactly one lock. Waiting
//! requires owning that lock; the wait releases it for the duration of
//! the suspension and reacquires it before returning, restoring the
//! saved hold count.
//!
//! Wakeups follow Mesa semantics: a returning wait carries no guarantee
//! about the predicate, and a signal delivered while nobody waits is
//! lost. Callers must always re-check their predicate in a loop:
//!
//! ```
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicBool, Ordering};
//! use synckit_primitives::{ConditionVariable, ExclusiveLock};
//!
//! let lock = Arc::new(ExclusiveLock::new());
//! let ready = AtomicBool::new(true);
//! let condvar = ConditionVariable::for_lock(&lock);
//!
//! lock.acquire().unwrap();
//! while !ready.load(Ordering::Acquire) {
//!     condvar.wait().unwrap();
//! }
//! lock.release().unwrap();
//! ```

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::cancel::{CancelToken, CANCEL_POLL};
use crate::errors::LockError;
use crate::exclusive::ExclusiveLock;

/// Whether a timed wait returned because of the timeout.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WaitTimeoutResult {
    timed_out: bool,
}

impl WaitTimeoutResult {
    /// `true` when the wait returned because the timeout elapsed rather
    /// than because of a signal.
    #[must_use]
    pub const fn timed_out(&self) -> bool {
        self.timed_out
    }
}

#[derive(Debug, Default)]
struct WaitState {
    /// Threads currently suspended in a wait call.
    waiters: usize,
    /// Wakeups granted but not yet consumed by a waiter.
    signals: usize,
}

/// A condition variable tied to one [`ExclusiveLock`].
pub struct ConditionVariable {
    lock: Arc<ExclusiveLock>,
    state: Mutex<WaitState>,
    wakeups: Condvar,
}

impl ConditionVariable {
    /// Creates a condition variable bound to `lock`.
    #[must_use]
    pub fn for_lock(lock: &Arc<ExclusiveLock>) -> Self {
        Self {
            lock: Arc::clone(lock),
            state: Mutex::new(WaitState::default()),
            wakeups: Condvar::new(),
        }
    }

    /// The lock this condition variable is bound to.
    #[must_use]
    pub fn lock(&self) -> &ExclusiveLock {
        &self.lock
    }

    /// Atomically releases the bound lock, suspends the calling thread
    /// until a signal arrives, and reacquires the lock before returning.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::NotOwner`] when the caller does not own the
    /// bound lock; nothing is released in that case.
    pub fn wait(&self) -> Result<(), LockError> {
        let mut state = self.lock_wait_state();
        let holds = self.lock.release_all_for_wait()?;

        state.waiters += 1;
        while state.signals == 0 {
            state = self
                .wakeups
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        state.signals -= 1;
        state.waiters -= 1;
        drop(state);

        self.lock.reacquire_after_wait(holds);
        Ok(())
    }

    /// Like [`wait`](ConditionVariable::wait), but also returns once
    /// `timeout` has elapsed. The lock is reacquired on both paths; the
    /// result distinguishes a signal from a timeout.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::NotOwner`] when the caller does not own the
    /// bound lock.
    pub fn wait_timeout(&self, timeout: Duration) -> Result<WaitTimeoutResult, LockError> {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock_wait_state();
        let holds = self.lock.release_all_for_wait()?;

        state.waiters += 1;
        let mut timed_out = false;
        while state.signals == 0 {
            let now = Instant::now();
            if now >= deadline {
                timed_out = true;
                break;
            }
            let (reacquired, _outcome) = self
                .wakeups
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            state = reacquired;
        }
        if !timed_out {
            state.signals -= 1;
        }
        state.waiters -= 1;
        // a signal granted to a waiter that left on the timeout path
        // must not linger for threads that have not arrived yet
        state.signals = state.signals.min(state.waiters);
        drop(state);

        self.lock.reacquire_after_wait(holds);
        Ok(WaitTimeoutResult { timed_out })
    }

    /// Like [`wait`](ConditionVariable::wait), but gives up when `token`
    /// is cancelled. The bound lock is reacquired before the
    /// cancellation surfaces, so cleanup code runs under the lock.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Cancelled`] on cancellation, or
    /// [`LockError::NotOwner`] when the caller does not own the lock.
    pub fn wait_interruptible(&self, token: &CancelToken) -> Result<(), LockError> {
        let mut state = self.lock_wait_state();
        let holds = self.lock.release_all_for_wait()?;

        state.waiters += 1;
        let mut cancelled = false;
        while state.signals == 0 {
            if token.is_cancelled() {
                cancelled = true;
                break;
            }
            let (reacquired, _outcome) = self
                .wakeups
                .wait_timeout(state, CANCEL_POLL)
                .unwrap_or_else(PoisonError::into_inner);
            state = reacquired;
        }
        if !cancelled {
            state.signals -= 1;
        }
        state.waiters -= 1;
        state.signals = state.signals.min(state.waiters);
        drop(state);

        self.lock.reacquire_after_wait(holds);
        if cancelled {
            Err(LockError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Wakes at most one suspended waiter. Which one is unspecified.
    ///
    /// A signal with no waiters is lost, never buffered.
    pub fn signal_one(&self) {
        let mut state = self.lock_wait_state();
        if state.waiters > state.signals {
            state.signals += 1;
            self.wakeups.notify_one();
        }
    }

    /// Wakes every currently suspended waiter.
    pub fn signal_all(&self) {
        let mut state = self.lock_wait_state();
        if state.waiters > state.signals {
            state.signals = state.waiters;
            self.wakeups.notify_all();
        }
    }

    fn lock_wait_state(&self) -> std::sync::MutexGuard<'_, WaitState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
