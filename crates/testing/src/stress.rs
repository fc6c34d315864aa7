//! Configurable high-contention test harness.
//!
//! Runs one operation from many threads for many iterations and counts
//! how often it reported success, so property tests can assert exact
//! totals ("N threads × M iterations ⇒ N×M increments") or detect that
//! an unsynchronized operation misbehaves at least once.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Thread and iteration counts for one stress run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StressConfig {
    threads: usize,
    iterations: usize,
}

impl StressConfig {
    /// Two threads, one thousand iterations.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            threads: 2,
            iterations: 1_000,
        }
    }

    /// Sets the number of concurrent threads.
    #[must_use]
    pub const fn threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Sets the number of iterations per thread.
    #[must_use]
    pub const fn iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    /// Configured thread count.
    #[must_use]
    pub const fn thread_count(&self) -> usize {
        self.threads
    }

    /// Configured iterations per thread.
    #[must_use]
    pub const fn iteration_count(&self) -> usize {
        self.iterations
    }
}

impl Default for StressConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of a stress run.
#[derive(Debug, Clone)]
pub struct StressResult {
    /// Operations that reported success.
    pub successes: usize,
    /// Operations that reported failure.
    pub failures: usize,
    /// Wall-clock time for the whole run.
    pub duration: Duration,
    /// Number of threads used.
    pub thread_count: usize,
}

impl StressResult {
    /// Total operations attempted.
    #[must_use]
    pub const fn total_operations(&self) -> usize {
        self.successes + self.failures
    }
}

/// Drives an operation from every configured thread.
pub struct StressHarness {
    config: StressConfig,
}

impl StressHarness {
    /// Creates a harness for `config`.
    #[must_use]
    pub const fn new(config: StressConfig) -> Self {
        Self { config }
    }

    /// Runs `op(thread_id, iteration)` from every thread for every
    /// iteration, counting `true` returns as successes.
    ///
    /// # Panics
    ///
    /// Panics when a worker thread panics, propagating the failure to
    /// the test.
    pub fn run<F>(&self, op: F) -> StressResult
    where
        F: Fn(usize, usize) -> bool + Send + Sync + 'static,
    {
        let op = Arc::new(op);
        let successes = Arc::new(AtomicUsize::new(0));
        let failures = Arc::new(AtomicUsize::new(0));
        let started = Instant::now();

        let workers: Vec<_> = (0..self.config.threads)
            .map(|thread_id| {
                let op = Arc::clone(&op);
                let successes = Arc::clone(&successes);
                let failures = Arc::clone(&failures);
                let iterations = self.config.iterations;
                thread::spawn(move || {
                    for iteration in 0..iterations {
                        if op(thread_id, iteration) {
                            successes.fetch_add(1, Ordering::Relaxed);
                        } else {
                            failures.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().expect("stress worker panicked");
        }

        let result = StressResult {
            successes: successes.load(Ordering::Relaxed),
            failures: failures.load(Ordering::Relaxed),
            duration: started.elapsed(),
            thread_count: self.config.threads,
        };
        tracing::debug!(
            successes = result.successes,
            failures = result.failures,
            ?result.duration,
            "stress run finished"
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_every_operation() {
        let config = StressConfig::new().threads(3).iterations(50);
        let harness = StressHarness::new(config);

        let result = harness.run(|_thread_id, iteration| iteration % 2 == 0);
        assert_eq!(result.total_operations(), 150);
        assert_eq!(result.successes, 75);
        assert_eq!(result.failures, 75);
        assert_eq!(result.thread_count, 3);
    }
}
