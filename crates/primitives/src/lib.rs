//! Thread-synchronization primitives for preemptive OS threads.
//!
//! Everything here blocks by parking the calling thread — suspension
//! points are lock acquisition under contention, condition waits and
//! semaphore exhaustion. Shared state belongs behind one of these
//! primitives; the only sanctioned lock-free escape hatch is
//! [`AtomicCell`], whose individual operations are linearizable but
//! whose compositions are not.

// Public modules
pub mod atomic_cell;
pub mod cancel;
pub mod condvar;
pub mod errors;
pub mod exclusive;
pub mod ordered;
pub mod rwlock;
pub mod semaphore;
pub mod spin_wait;

// Re-export error types
pub use errors::{LockError, SemaphoreError};

// Re-export lock types
pub use exclusive::{ExclusiveGuard, ExclusiveLock, LockOptions};
pub use rwlock::{ReadGuard, ReadWriteLock, WriteGuard};

// Re-export coordination types
pub use condvar::{ConditionVariable, WaitTimeoutResult};
pub use semaphore::CountingSemaphore;

// Re-export atomic types
pub use atomic_cell::AtomicCell;

// Re-export cancellation and ordering helpers
pub use cancel::CancelToken;
pub use ordered::{acquire_as_listed, acquire_ordered, RankedResource};
pub use spin_wait::SpinWait;
