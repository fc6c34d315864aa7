//! Exponential backoff for short optimistic retry loops.
//!
//! Compare-and-swap loops that lose a race should not hammer the cache
//! line immediately; backing off exponentially keeps the loop responsive
//! under light contention without burning a core under heavy contention.

use core::hint;

/// Number of backoff rounds before the caller should consider yielding.
const SPIN_LIMIT: u32 = 10;

/// Exponential backoff helper for retry loops.
///
/// Each [`spin`](SpinWait::spin) call busy-waits for twice as many
/// iterations as the previous one. Once the limit is reached `spin`
/// returns `false` and the caller should yield, block, or
/// [`reset`](SpinWait::reset) and start over.
pub struct SpinWait {
    rounds: u32,
}

impl SpinWait {
    /// Creates a fresh backoff sequence.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self { rounds: 0 }
    }

    /// Performs one backoff round.
    ///
    /// Returns `true` while spinning is still reasonable, `false` once
    /// the round limit has been reached.
    #[inline]
    pub fn spin(&mut self) -> bool {
        if self.rounds >= SPIN_LIMIT {
            return false;
        }

        for _ in 0..(1u32 << self.rounds) {
            hint::spin_loop();
        }

        self.rounds += 1;
        true
    }

    /// Restarts the backoff sequence.
    #[inline]
    pub fn reset(&mut self) {
        self.rounds = 0;
    }

    /// Whether the round limit has been reached.
    #[inline]
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.rounds >= SPIN_LIMIT
    }
}

impl Default for SpinWait {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}
