//! Counting semaphore with a bounded permit pool.
//!
//! The number of outstanding permits never exceeds the configured
//! capacity: a release that would overflow is reported as an error, not
//! clamped. Blocked acquisitions are served strictly in arrival order —
//! a large request at the head of the queue is not overtaken by smaller
//! ones that arrived later.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::cancel::{CancelToken, CANCEL_POLL};
use crate::errors::SemaphoreError;

#[derive(Debug)]
struct PermitState {
    permits: usize,
    next_ticket: u64,
    /// Arrival order of blocked acquisitions: (ticket, permits wanted).
    waiters: VecDeque<(u64, usize)>,
}

/// A bounded pool of permits.
///
/// # Examples
///
/// ```
/// use synckit_primitives::CountingSemaphore;
///
/// // at most two concurrent sessions
/// let gate = CountingSemaphore::new(2);
/// gate.acquire(1).unwrap();
/// gate.acquire(1).unwrap();
/// assert!(!gate.try_acquire(1));
/// gate.release(1).unwrap();
/// assert!(gate.try_acquire(1));
/// ```
#[derive(Debug)]
pub struct CountingSemaphore {
    capacity: usize,
    state: Mutex<PermitState>,
    available: Condvar,
}

impl CountingSemaphore {
    /// Creates a semaphore with `capacity` permits, all available.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            state: Mutex::new(PermitState {
                permits: capacity,
                next_ticket: 0,
                waiters: VecDeque::new(),
            }),
            available: Condvar::new(),
        }
    }

    /// The configured maximum number of permits.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Permits currently available for acquisition.
    #[must_use]
    pub fn available_permits(&self) -> usize {
        self.lock_state().permits
    }

    /// Blocks until `permits` permits are available, then takes them.
    ///
    /// # Errors
    ///
    /// Returns [`SemaphoreError::BeyondCapacity`] when `permits` exceeds
    /// the configured capacity and so could never be satisfied.
    pub fn acquire(&self, permits: usize) -> Result<(), SemaphoreError> {
        self.acquire_inner(permits, None, None)
    }

    /// Like [`acquire`](CountingSemaphore::acquire), but gives up when
    /// `token` is cancelled while the thread is suspended.
    ///
    /// # Errors
    ///
    /// Returns [`SemaphoreError::Cancelled`] on cancellation, or
    /// [`SemaphoreError::BeyondCapacity`] as for `acquire`.
    pub fn acquire_interruptible(
        &self,
        permits: usize,
        token: &CancelToken,
    ) -> Result<(), SemaphoreError> {
        self.acquire_inner(permits, Some(token), None)
    }

    /// Like [`acquire`](CountingSemaphore::acquire), but gives up once
    /// `timeout` has elapsed.
    ///
    /// # Errors
    ///
    /// Returns [`SemaphoreError::Timeout`] when the wait elapsed, or
    /// [`SemaphoreError::BeyondCapacity`] as for `acquire`.
    pub fn acquire_timeout(
        &self,
        permits: usize,
        timeout: Duration,
    ) -> Result<(), SemaphoreError> {
        self.acquire_inner(permits, None, Some(Instant::now() + timeout))
    }

    /// Takes `permits` permits only when that is possible immediately.
    ///
    /// Returns `true` on success. Never overtakes queued waiters.
    pub fn try_acquire(&self, permits: usize) -> bool {
        if permits == 0 {
            return true;
        }
        let mut state = self.lock_state();
        if state.waiters.is_empty() && state.permits >= permits {
            state.permits -= permits;
            return true;
        }
        false
    }

    /// Returns `permits` permits to the pool and wakes queued waiters
    /// whose requests can now be satisfied.
    ///
    /// # Errors
    ///
    /// Returns [`SemaphoreError::CapacityExceeded`] when the release
    /// would push the pool past its capacity — more permits would exist
    /// than were ever configured, which is a usage error.
    pub fn release(&self, permits: usize) -> Result<(), SemaphoreError> {
        if permits == 0 {
            return Ok(());
        }
        let mut state = self.lock_state();
        let outstanding = self.capacity - state.permits;
        if permits > outstanding {
            return Err(SemaphoreError::CapacityExceeded {
                requested: permits,
                capacity: self.capacity,
            });
        }
        state.permits += permits;
        drop(state);
        self.available.notify_all();
        Ok(())
    }

    fn acquire_inner(
        &self,
        permits: usize,
        token: Option<&CancelToken>,
        deadline: Option<Instant>,
    ) -> Result<(), SemaphoreError> {
        if permits == 0 {
            return Ok(());
        }
        if permits > self.capacity {
            return Err(SemaphoreError::BeyondCapacity {
                requested: permits,
                capacity: self.capacity,
            });
        }

        let mut state = self.lock_state();

        // fast path: nobody queued and enough permits free
        if state.waiters.is_empty() && state.permits >= permits {
            state.permits -= permits;
            return Ok(());
        }

        let ticket = state.next_ticket;
        state.next_ticket += 1;
        state.waiters.push_back((ticket, permits));

        loop {
            let at_front = state.waiters.front().map(|&(front, _)| front) == Some(ticket);
            if at_front && state.permits >= permits {
                state.permits -= permits;
                state.waiters.pop_front();
                drop(state);
                // the next queued request may be satisfiable as well
                self.available.notify_all();
                return Ok(());
            }

            if token.is_some() || deadline.is_some() {
                let now = Instant::now();
                if let Some(deadline) = deadline {
                    if now >= deadline {
                        Self::abandon_ticket(&mut state, ticket);
                        self.available.notify_all();
                        return Err(SemaphoreError::Timeout);
                    }
                }
                if token.is_some_and(CancelToken::is_cancelled) {
                    Self::abandon_ticket(&mut state, ticket);
                    self.available.notify_all();
                    return Err(SemaphoreError::Cancelled);
                }

                let mut wait_for = CANCEL_POLL;
                if let Some(deadline) = deadline {
                    wait_for = wait_for.min(deadline - now);
                }
                let (reacquired, _outcome) = self
                    .available
                    .wait_timeout(state, wait_for)
                    .unwrap_or_else(PoisonError::into_inner);
                state = reacquired;
            } else {
                state = self
                    .available
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner);
            }
        }
    }

    fn abandon_ticket(state: &mut PermitState, ticket: u64) {
        if let Some(position) = state
            .waiters
            .iter()
            .position(|&(waiting, _)| waiting == ticket)
        {
            state.waiters.remove(position);
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, PermitState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
