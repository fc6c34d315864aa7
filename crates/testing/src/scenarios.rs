//! Shared-counter scenarios for property tests.
//!
//! [`LockedCounter`] is the correct construction: every update flows
//! through an [`ExclusiveLock`], so N threads × M increments always
//! lands on exactly N×M.
//!
//! [`RacyCounter`] is the documented hazard kept on purpose: it updates
//! with an atomic load followed by an atomic store. Each step is
//! linearizable but the pair is not, so concurrent updates can be lost.
//! Tests use it to prove the harness can observe the race that the
//! locked variant prevents — never as a building block.

use std::cell::UnsafeCell;

use synckit_primitives::{AtomicCell, ExclusiveLock};

/// A counter whose every access goes through an exclusive lock.
pub struct LockedCounter {
    lock: ExclusiveLock,
    value: UnsafeCell<i64>,
}

// SAFETY: `value` is only touched while `lock` is held.
unsafe impl Sync for LockedCounter {}
unsafe impl Send for LockedCounter {}

impl LockedCounter {
    /// Creates a counter at zero.
    #[must_use]
    pub fn new() -> Self {
        Self {
            lock: ExclusiveLock::new(),
            value: UnsafeCell::new(0),
        }
    }

    /// Adds `delta` under the lock.
    pub fn add(&self, delta: i64) {
        let _guard = self.lock.guard().expect("counter lock misuse");
        // SAFETY: the exclusive lock is held for the whole update.
        unsafe {
            *self.value.get() += delta;
        }
    }

    /// Reads the current value under the lock.
    #[must_use]
    pub fn get(&self) -> i64 {
        let _guard = self.lock.guard().expect("counter lock misuse");
        // SAFETY: the exclusive lock is held for the read.
        unsafe { *self.value.get() }
    }
}

impl Default for LockedCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// A counter updated with a non-atomic read-then-write pair.
///
/// Loses updates under contention by construction. Exists so the test
/// suite can demonstrate that the race is real and detectable.
pub struct RacyCounter {
    cell: AtomicCell<i64>,
}

impl RacyCounter {
    /// Creates a counter at zero.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cell: AtomicCell::new(0),
        }
    }

    /// Adds `delta` without synchronizing the read-modify-write.
    pub fn add(&self, delta: i64) {
        let current = self.cell.load();
        // another thread may update between these two operations;
        // that update is then overwritten
        self.cell.store(current + delta);
    }

    /// Reads the current value.
    #[must_use]
    pub fn get(&self) -> i64 {
        self.cell.load()
    }
}

impl Default for RacyCounter {
    fn default() -> Self {
        Self::new()
    }
}
