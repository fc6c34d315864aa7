//! Error types shared by the synchronization primitives.

use thiserror::Error;

/// Errors surfaced by [`ExclusiveLock`](crate::ExclusiveLock),
/// [`ConditionVariable`](crate::ConditionVariable) and the ordered
/// acquisition helpers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LockError {
    /// A release or wait was attempted by a thread that does not own the
    /// lock. This is a programming defect in the caller, not a runtime
    /// condition that can be retried.
    #[error("lock operation by a thread that does not own the lock")]
    NotOwner,

    /// A non-reentrant lock was re-acquired by its current owner. The
    /// acquisition would never complete, so it is refused instead.
    #[error("non-reentrant lock re-acquired by its owner")]
    WouldDeadlock,

    /// Two resources in an acquisition set share the same rank, leaving
    /// their relative acquisition order undefined.
    #[error("resources share the same rank; acquisition order is undefined")]
    AmbiguousRank,

    /// The blocking call observed a cancellation request while suspended.
    #[error("blocking call cancelled")]
    Cancelled,

    /// A timed acquisition elapsed before the lock became available.
    #[error("timed wait elapsed")]
    Timeout,
}

/// Errors surfaced by [`CountingSemaphore`](crate::CountingSemaphore).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SemaphoreError {
    /// A release would push the number of available permits past the
    /// configured capacity. Signaled rather than silently clamped.
    #[error("releasing {requested} permit(s) would exceed capacity {capacity}")]
    CapacityExceeded {
        /// Permits the caller tried to hand back.
        requested: usize,
        /// Capacity the semaphore was built with.
        capacity: usize,
    },

    /// More permits were requested in one call than the semaphore can
    /// ever hold, so the acquisition could never complete.
    #[error("acquiring {requested} permit(s) can never succeed with capacity {capacity}")]
    BeyondCapacity {
        /// Permits the caller asked for.
        requested: usize,
        /// Capacity the semaphore was built with.
        capacity: usize,
    },

    /// The blocking call observed a cancellation request while suspended.
    #[error("blocking call cancelled")]
    Cancelled,

    /// A timed acquisition elapsed before enough permits became free.
    #[error("timed wait elapsed")]
    Timeout,
}
