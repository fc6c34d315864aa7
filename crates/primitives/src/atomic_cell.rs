//! Lock-free atomic register for small `Copy` types.
//!
//! Stores the bit pattern of a value of up to 8 bytes inside an
//! [`AtomicU64`], so every operation is a single hardware atomic.
//! Individual operations are linearizable; composing two of them is
//! **not** atomic — `load` followed by `store` can lose a concurrent
//! update, which is exactly the race that
//! [`compare_and_swap`](AtomicCell::compare_and_swap) loops exist to
//! avoid.

use core::fmt;
use core::marker::PhantomData;
use core::mem;
use core::ops::Add;
use core::ptr;
use core::sync::atomic::{AtomicU64, Ordering};

use crate::spin_wait::SpinWait;

/// An atomic cell holding any `Copy` value of at most 8 bytes.
///
/// Comparison operations (`compare_and_swap`, `compare_exchange`) work
/// on the bit representation of the value. Intended for integers, small
/// enums and id-like types where bit equality and value equality
/// coincide; types with padding bytes may fail comparisons spuriously.
pub struct AtomicCell<T: Copy> {
    bits: AtomicU64,
    _marker: PhantomData<T>,
}

unsafe impl<T: Copy + Send> Send for AtomicCell<T> {}
unsafe impl<T: Copy + Send> Sync for AtomicCell<T> {}

impl<T: Copy> AtomicCell<T> {
    /// Creates a new cell holding `value`.
    ///
    /// Fails to compile when `T` is larger than 8 bytes.
    #[must_use]
    pub fn new(value: T) -> Self {
        const {
            assert!(
                mem::size_of::<T>() <= 8,
                "AtomicCell supports types of at most 8 bytes"
            );
        }
        Self {
            bits: AtomicU64::new(to_bits(value)),
            _marker: PhantomData,
        }
    }

    /// Atomically reads the value.
    #[inline]
    pub fn load(&self) -> T {
        from_bits(self.bits.load(Ordering::SeqCst))
    }

    /// Atomically replaces the value.
    #[inline]
    pub fn store(&self, value: T) {
        self.bits.store(to_bits(value), Ordering::SeqCst);
    }

    /// Atomically replaces the value, returning the previous one.
    #[inline]
    pub fn swap(&self, value: T) -> T {
        from_bits(self.bits.swap(to_bits(value), Ordering::SeqCst))
    }

    /// Consumes the cell and returns the final value.
    #[must_use]
    pub fn into_inner(self) -> T {
        from_bits(self.bits.into_inner())
    }
}

impl<T: Copy + PartialEq> AtomicCell<T> {
    /// Stores `new` only if the current value still equals `expected`.
    ///
    /// Returns `true` when the swap took effect. The comparison happens
    /// at the instant of the hardware compare-exchange, not at the time
    /// `expected` was read.
    #[inline]
    pub fn compare_and_swap(&self, expected: T, new: T) -> bool {
        self.compare_exchange(expected, new).is_ok()
    }

    /// Stores `new` only if the current value still equals `current`.
    ///
    /// # Errors
    ///
    /// Returns `Err(observed)` with the freshly observed value when the
    /// comparison failed.
    #[inline]
    pub fn compare_exchange(&self, current: T, new: T) -> Result<T, T> {
        match self.bits.compare_exchange(
            to_bits(current),
            to_bits(new),
            Ordering::SeqCst,
            Ordering::SeqCst,
        ) {
            Ok(previous) => Ok(from_bits(previous)),
            Err(observed) => Err(from_bits(observed)),
        }
    }

    /// Atomically applies `f` to the current value until the update
    /// sticks, returning the previous value.
    ///
    /// The retry loop is unbounded: a failed compare-exchange re-reads
    /// the freshly observed value and tries again, so it completes under
    /// any finite contention (lock-freedom, not wait-freedom).
    pub fn fetch_update<F>(&self, mut f: F) -> T
    where
        F: FnMut(T) -> T,
    {
        let mut backoff = SpinWait::new();
        let mut current = self.bits.load(Ordering::SeqCst);
        loop {
            let next = to_bits(f(from_bits::<T>(current)));
            match self
                .bits
                .compare_exchange_weak(current, next, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(previous) => return from_bits(previous),
                Err(observed) => {
                    current = observed;
                    if !backoff.spin() {
                        backoff.reset();
                    }
                }
            }
        }
    }

    /// Atomically adds `delta`, returning the previous value.
    #[inline]
    pub fn fetch_add(&self, delta: T) -> T
    where
        T: Add<Output = T>,
    {
        self.fetch_update(|current| current + delta)
    }
}

impl<T: Copy + Default> Default for AtomicCell<T> {
    #[inline]
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Copy> From<T> for AtomicCell<T> {
    #[inline]
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T: Copy + fmt::Debug> fmt::Debug for AtomicCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AtomicCell")
            .field("value", &self.load())
            .finish()
    }
}

fn to_bits<T: Copy>(value: T) -> u64 {
    let mut bits = 0u64;
    // SAFETY: size_of::<T>() <= 8 is enforced at construction, and both
    // pointers are valid for size_of::<T>() bytes.
    unsafe {
        ptr::copy_nonoverlapping(
            ptr::from_ref(&value).cast::<u8>(),
            ptr::from_mut(&mut bits).cast::<u8>(),
            mem::size_of::<T>(),
        );
    }
    bits
}

fn from_bits<T: Copy>(bits: u64) -> T {
    // SAFETY: `bits` was produced by `to_bits` from a valid T, and a u64
    // is aligned at least as strictly as any type that fits inside it.
    unsafe { ptr::read(ptr::from_ref(&bits).cast::<T>()) }
}
