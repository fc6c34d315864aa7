//! Periodic execution on a dedicated thread.
//!
//! The idiomatic replacement for a demonstration-style
//! `loop { sleep; print }`: the runner thread parks on its
//! [`CancelToken`] with a timeout of one interval, so cancellation is
//! observed immediately instead of at the end of a sleep.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use synckit_primitives::CancelToken;

/// A closure run every `interval` on its own thread until cancelled.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::time::Duration;
/// use synckit_pool::PeriodicTask;
///
/// let ticks = Arc::new(AtomicUsize::new(0));
/// let seen = Arc::clone(&ticks);
/// let reporter = PeriodicTask::spawn(Duration::from_millis(10), move || {
///     seen.fetch_add(1, Ordering::SeqCst);
/// });
///
/// std::thread::sleep(Duration::from_millis(100));
/// reporter.stop();
/// assert!(ticks.load(Ordering::SeqCst) > 0);
/// ```
pub struct PeriodicTask {
    token: CancelToken,
    thread: Option<JoinHandle<()>>,
}

impl PeriodicTask {
    /// Spawns the runner thread. The first tick happens one `interval`
    /// after the call, not immediately.
    #[must_use]
    pub fn spawn<F>(interval: Duration, mut tick: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        let token = CancelToken::new();
        let runner_token = token.clone();
        let thread = thread::Builder::new()
            .name(String::from("periodic"))
            .spawn(move || {
                while !runner_token.wait_timeout(interval) {
                    tick();
                }
                tracing::debug!("periodic task stopped");
            })
            .expect("failed to spawn periodic task thread");

        Self {
            token,
            thread: Some(thread),
        }
    }

    /// Requests the runner to stop without waiting for it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether the runner has been asked to stop.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Stops the runner and waits for its thread to exit.
    pub fn stop(mut self) {
        self.token.cancel();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.token.cancel();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn ticks_until_cancelled() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&ticks);
        let task = PeriodicTask::spawn(Duration::from_millis(5), move || {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        thread::sleep(Duration::from_millis(80));
        task.stop();
        let after_stop = ticks.load(Ordering::SeqCst);
        assert!(after_stop > 0);

        // no further ticks after stop returned
        thread::sleep(Duration::from_millis(30));
        assert_eq!(ticks.load(Ordering::SeqCst), after_stop);
    }

    #[test]
    fn cancel_before_first_tick() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&ticks);
        let task = PeriodicTask::spawn(Duration::from_secs(60), move || {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        task.cancel();
        assert!(task.is_cancelled());
        task.stop();
        assert_eq!(ticks.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn drop_stops_the_runner() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&ticks);
        {
            let _task = PeriodicTask::spawn(Duration::from_millis(5), move || {
                seen.fetch_add(1, Ordering::SeqCst);
            });
            thread::sleep(Duration::from_millis(30));
        }
        let after_drop = ticks.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(30));
        assert_eq!(ticks.load(Ordering::SeqCst), after_drop);
    }
}
