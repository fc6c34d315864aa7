//! Mutual-exclusion lock with explicit ownership tracking.
//!
//! Unlike a payload-carrying mutex, [`ExclusiveLock`] protects a code
//! region rather than a value: callers pair [`acquire`] with [`release`]
//! themselves (or use [`guard`] for scope-bound release). The lock
//! records its owner and hold count, which is what makes reentrancy,
//! fairness and misuse detection expressible — releasing a lock you do
//! not own is reported as [`LockError::NotOwner`], never silently
//! tolerated.
//!
//! [`acquire`]: ExclusiveLock::acquire
//! [`release`]: ExclusiveLock::release
//! [`guard`]: ExclusiveLock::guard

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, PoisonError};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use crate::cancel::{CancelToken, CANCEL_POLL};
use crate::errors::LockError;

/// Construction-time options for [`ExclusiveLock`].
///
/// `fair` guarantees waiters are granted the lock in arrival order, at
/// the cost of disallowing barging (a newly arriving thread can no
/// longer sneak past parked waiters). `reentrant` lets the owner
/// re-acquire, releasing for real only when every hold is released.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LockOptions {
    fair: bool,
    reentrant: bool,
}

impl LockOptions {
    /// Unfair, non-reentrant defaults.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            fair: false,
            reentrant: false,
        }
    }

    /// Grants the lock to waiters in strict arrival order.
    #[must_use]
    pub const fn fair(mut self, fair: bool) -> Self {
        self.fair = fair;
        self
    }

    /// Allows the owner to re-acquire, counting holds.
    #[must_use]
    pub const fn reentrant(mut self, reentrant: bool) -> Self {
        self.reentrant = reentrant;
        self
    }

    /// Whether arrival-order granting is enabled.
    #[must_use]
    pub const fn is_fair(&self) -> bool {
        self.fair
    }

    /// Whether owner re-acquisition is enabled.
    #[must_use]
    pub const fn is_reentrant(&self) -> bool {
        self.reentrant
    }
}

#[derive(Debug)]
struct OwnerState {
    owner: Option<ThreadId>,
    hold_count: u32,
    next_ticket: u64,
    /// Arrival order of parked threads; only maintained in fair mode.
    waiters: VecDeque<u64>,
}

/// A mutual-exclusion lock with owner tracking, optional reentrancy and
/// optional FIFO fairness.
///
/// # Examples
///
/// ```
/// use synckit_primitives::ExclusiveLock;
///
/// let lock = ExclusiveLock::new();
/// lock.acquire().unwrap();
/// // ... critical section ...
/// lock.release().unwrap();
/// ```
#[derive(Debug)]
pub struct ExclusiveLock {
    state: Mutex<OwnerState>,
    available: Condvar,
    options: LockOptions,
}

impl Default for ExclusiveLock {
    fn default() -> Self {
        Self::new()
    }
}

impl ExclusiveLock {
    /// Creates an unfair, non-reentrant lock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(LockOptions::new())
    }

    /// Creates a lock with the given [`LockOptions`].
    #[must_use]
    pub fn with_options(options: LockOptions) -> Self {
        Self {
            state: Mutex::new(OwnerState {
                owner: None,
                hold_count: 0,
                next_ticket: 0,
                waiters: VecDeque::new(),
            }),
            available: Condvar::new(),
            options,
        }
    }

    /// The options this lock was built with.
    #[must_use]
    pub fn options(&self) -> LockOptions {
        self.options
    }

    /// Blocks the calling thread until it owns the lock.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::WouldDeadlock`] when a non-reentrant lock is
    /// re-acquired by its current owner; the call would otherwise never
    /// return.
    pub fn acquire(&self) -> Result<(), LockError> {
        self.acquire_inner(None, None, 1)
    }

    /// Like [`acquire`](ExclusiveLock::acquire), but gives up when
    /// `token` is cancelled while the thread is suspended.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Cancelled`] on cancellation, or
    /// [`LockError::WouldDeadlock`] as for `acquire`.
    pub fn acquire_interruptible(&self, token: &CancelToken) -> Result<(), LockError> {
        self.acquire_inner(Some(token), None, 1)
    }

    /// Like [`acquire`](ExclusiveLock::acquire), but gives up once
    /// `timeout` has elapsed.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Timeout`] when the wait elapsed, or
    /// [`LockError::WouldDeadlock`] as for `acquire`.
    pub fn acquire_timeout(&self, timeout: Duration) -> Result<(), LockError> {
        self.acquire_inner(None, Some(Instant::now() + timeout), 1)
    }

    /// Attempts to take the lock without blocking.
    ///
    /// Returns `true` on success. In fair mode a free lock with parked
    /// waiters is *not* taken — barging would break arrival order.
    pub fn try_acquire(&self) -> bool {
        let mut state = self.lock_state();
        let me = thread::current().id();

        if state.owner == Some(me) {
            if self.options.reentrant {
                state.hold_count += 1;
                return true;
            }
            return false;
        }

        if state.owner.is_none() && (!self.options.fair || state.waiters.is_empty()) {
            state.owner = Some(me);
            state.hold_count = 1;
            return true;
        }
        false
    }

    /// Releases one hold of the lock.
    ///
    /// The lock becomes available to others only when every hold taken
    /// by the owner has been released.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::NotOwner`] when the calling thread does not
    /// own the lock. This indicates a defect in the caller.
    pub fn release(&self) -> Result<(), LockError> {
        let mut state = self.lock_state();
        if state.owner != Some(thread::current().id()) {
            return Err(LockError::NotOwner);
        }

        state.hold_count -= 1;
        if state.hold_count == 0 {
            state.owner = None;
            drop(state);
            self.wake_next();
        }
        Ok(())
    }

    /// Acquires and returns a guard that releases on drop.
    ///
    /// # Errors
    ///
    /// Same as [`acquire`](ExclusiveLock::acquire).
    pub fn guard(&self) -> Result<ExclusiveGuard<'_>, LockError> {
        self.acquire()?;
        Ok(ExclusiveGuard { lock: self })
    }

    /// Whether any thread currently owns the lock.
    #[must_use]
    pub fn is_held(&self) -> bool {
        self.lock_state().owner.is_some()
    }

    /// Whether the calling thread currently owns the lock.
    #[must_use]
    pub fn is_held_by_current_thread(&self) -> bool {
        self.lock_state().owner == Some(thread::current().id())
    }

    /// The owner's current hold count, zero when unheld.
    #[must_use]
    pub fn hold_count(&self) -> u32 {
        self.lock_state().hold_count
    }

    /// Releases every hold at once on behalf of a condition wait,
    /// returning the count so it can be restored on reacquisition.
    pub(crate) fn release_all_for_wait(&self) -> Result<u32, LockError> {
        let mut state = self.lock_state();
        if state.owner != Some(thread::current().id()) {
            return Err(LockError::NotOwner);
        }
        let holds = state.hold_count;
        state.hold_count = 0;
        state.owner = None;
        drop(state);
        self.wake_next();
        Ok(holds)
    }

    /// Re-takes the lock after a condition wait, restoring `holds`.
    ///
    /// The waiter rejoins the back of the queue in fair mode.
    pub(crate) fn reacquire_after_wait(&self, holds: u32) {
        // The thread fully released in release_all_for_wait, so the
        // owner-reentrancy branch cannot trigger and the only possible
        // outcome is a successful claim.
        let _ = self.acquire_inner(None, None, holds);
    }

    fn acquire_inner(
        &self,
        token: Option<&CancelToken>,
        deadline: Option<Instant>,
        holds_on_claim: u32,
    ) -> Result<(), LockError> {
        let me = thread::current().id();
        let mut state = self.lock_state();

        if state.owner == Some(me) {
            if self.options.reentrant {
                state.hold_count += 1;
                return Ok(());
            }
            return Err(LockError::WouldDeadlock);
        }

        let ticket = if self.options.fair {
            let ticket = state.next_ticket;
            state.next_ticket += 1;
            state.waiters.push_back(ticket);
            Some(ticket)
        } else {
            None
        };

        loop {
            let may_claim = state.owner.is_none()
                && match ticket {
                    Some(ticket) => state.waiters.front() == Some(&ticket),
                    None => true,
                };
            if may_claim {
                if ticket.is_some() {
                    state.waiters.pop_front();
                }
                state.owner = Some(me);
                state.hold_count = holds_on_claim;
                return Ok(());
            }

            if token.is_some() || deadline.is_some() {
                let now = Instant::now();
                if let Some(deadline) = deadline {
                    if now >= deadline {
                        Self::abandon_ticket(&mut state, ticket);
                        self.available.notify_all();
                        tracing::trace!("lock acquisition timed out");
                        return Err(LockError::Timeout);
                    }
                }
                if token.is_some_and(CancelToken::is_cancelled) {
                    Self::abandon_ticket(&mut state, ticket);
                    self.available.notify_all();
                    tracing::trace!("lock acquisition cancelled");
                    return Err(LockError::Cancelled);
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

    fn abandon_ticket(state: &mut OwnerState, ticket: Option<u64>) {
        if let Some(ticket) = ticket {
            if let Some(position) = state.waiters.iter().position(|&waiting| waiting == ticket) {
                state.waiters.remove(position);
            }
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, OwnerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wake_next(&self) {
        if self.options.fair {
            // every parked thread checks whether its ticket is at the
            // front; only the right one claims
            self.available.notify_all();
        } else {
            self.available.notify_one();
        }
    }
}

/// Scope-bound ownership of an [`ExclusiveLock`]; releases on drop.
#[derive(Debug)]
pub struct ExclusiveGuard<'a> {
    lock: &'a ExclusiveLock,
}

impl ExclusiveGuard<'_> {
    /// The lock this guard holds.
    #[must_use]
    pub fn lock(&self) -> &ExclusiveLock {
        self.lock
    }
}

impl Drop for ExclusiveGuard<'_> {
    fn drop(&mut self) {
        // The guard exists only after a successful acquire on this
        // thread, so release cannot observe a foreign owner.
        let _ = self.lock.release();
    }
}
