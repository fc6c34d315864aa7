//! Deadlock-free acquisition of multiple locks via a global order.
//!
//! Deadlock needs a circular wait. Assigning every resource a rank from
//! one total order and always acquiring in ascending rank makes a cycle
//! impossible: every edge in the wait-for graph points from a lower to a
//! higher rank. [`acquire_ordered`] sorts the requested resources before
//! taking any of them, so callers cannot get the order wrong.
//!
//! [`acquire_as_listed`] deliberately skips the sorting. It exists as a
//! negative fixture: two threads acquiring the same resources in
//! conflicting orders through it will, sooner or later, hang on each
//! other. Test harnesses detect that with a bounded wait; the toolkit
//! itself performs no deadlock detection.

use crate::errors::LockError;
use crate::exclusive::{ExclusiveGuard, ExclusiveLock};

/// A lockable resource with a rank in the global acquisition order.
///
/// Ranks must be unique within any set acquired together; the rank is
/// assigned once at construction and never changes.
#[derive(Debug)]
pub struct RankedResource {
    rank: u64,
    label: String,
    lock: ExclusiveLock,
}

impl RankedResource {
    /// Creates a resource with the given rank and a human-readable
    /// label for trace output.
    #[must_use]
    pub fn new(rank: u64, label: impl Into<String>) -> Self {
        Self {
            rank,
            label: label.into(),
            lock: ExclusiveLock::new(),
        }
    }

    /// This resource's position in the global acquisition order.
    #[must_use]
    pub fn rank(&self) -> u64 {
        self.rank
    }

    /// The label given at construction.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Direct access to the underlying lock.
    ///
    /// Intended for single-resource critical sections; multi-resource
    /// paths should go through [`acquire_ordered`].
    #[must_use]
    pub fn lock(&self) -> &ExclusiveLock {
        &self.lock
    }
}

/// Acquires every resource in ascending rank order, returning one guard
/// per resource. Guards may be dropped (released) in any order.
///
/// If an acquisition fails partway, the guards taken so far are dropped
/// and their locks released before the error returns.
///
/// # Errors
///
/// Returns [`LockError::AmbiguousRank`] when two resources share a
/// rank (their relative order would be undefined), or any error the
/// underlying [`ExclusiveLock::acquire`] reports.
pub fn acquire_ordered<'a>(
    resources: &[&'a RankedResource],
) -> Result<Vec<ExclusiveGuard<'a>>, LockError> {
    let mut sorted: Vec<&RankedResource> = resources.to_vec();
    sorted.sort_by_key(|resource| resource.rank);
    if sorted
        .windows(2)
        .any(|pair| pair[0].rank == pair[1].rank)
    {
        return Err(LockError::AmbiguousRank);
    }

    let mut guards = Vec::with_capacity(sorted.len());
    for resource in sorted {
        tracing::debug!(rank = resource.rank, label = %resource.label, "acquiring resource");
        guards.push(resource.lock.guard()?);
    }
    Ok(guards)
}

/// Acquires resources in exactly the order given, without sorting.
///
/// This is the hazard [`acquire_ordered`] exists to prevent: two
/// threads calling this with conflicting orders can enter a circular
/// wait and hang forever. Kept for reproducing deadlock in tests; do
/// not use it in production paths.
///
/// # Errors
///
/// Any error the underlying [`ExclusiveLock::acquire`] reports.
pub fn acquire_as_listed<'a>(
    resources: &[&'a RankedResource],
) -> Result<Vec<ExclusiveGuard<'a>>, LockError> {
    let mut guards = Vec::with_capacity(resources.len());
    for resource in resources {
        tracing::debug!(
            rank = resource.rank,
            label = %resource.label,
            "acquiring resource (caller order)"
        );
        guards.push(resource.lock.guard()?);
    }
    Ok(guards)
}
