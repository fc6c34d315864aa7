//! Fixed-size worker pool over a lock-and-condition guarded queue.
//!
//! A pool owns `worker_count` long-lived threads that loop over one
//! shared task queue. The queue and all lifecycle counters live behind
//! the toolkit's own [`ExclusiveLock`] with [`ConditionVariable`]s for
//! the not-empty, not-full and drain-progress conditions — the same
//! pattern callers are expected to use for their own shared state.
//!
//! Lifecycle: `Running` accepts submissions; [`shutdown`] moves the
//! pool through `Draining` (queue still processed, submissions
//! rejected) to `Terminated`. Ordinary tasks are always run to
//! completion before shutdown returns; background tasks are the
//! explicit exception and never hold shutdown up.
//!
//! [`shutdown`]: WorkerPool::shutdown

use std::cell::UnsafeCell;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::Receiver;
use synckit_primitives::{AtomicCell, ConditionVariable, ExclusiveLock};

use crate::activity::{ActivityBroadcast, PoolActivity};
use crate::builder::{OverflowPolicy, PanicSink, QueueCapacity, WorkerPoolBuilder};
use crate::errors::SubmitError;
use crate::task::{create_task, QueuedTask, TaskHandle, TaskId, TaskOutcome};

/// Pool lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    /// Accepting and executing tasks.
    Running,
    /// Shutdown requested: no new submissions, queue still processed.
    Draining,
    /// Final state: ordinary work finished, workers told to exit.
    Terminated,
}

/// What [`WorkerPool::shutdown`] observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// All ordinary tasks finished and the workers exited (workers
    /// still busy on background tasks excepted).
    Completed,
    /// The timeout elapsed first; `unfinished` ordinary tasks were
    /// still queued or executing.
    TimedOut {
        /// Ordinary tasks not yet complete when the timeout hit.
        unfinished: usize,
    },
}

struct PoolQueue {
    state: PoolState,
    tasks: VecDeque<QueuedTask>,
    /// Queued plus executing non-background tasks.
    ordinary_pending: usize,
    /// Workers currently executing a background task.
    busy_background: usize,
    /// Workers that have not yet exited their serving loop.
    live_workers: usize,
}

struct PoolShared {
    queue_lock: Arc<ExclusiveLock>,
    not_empty: ConditionVariable,
    not_full: ConditionVariable,
    progress: ConditionVariable,
    /// Accessed only while `queue_lock` is held.
    queue: UnsafeCell<PoolQueue>,
    capacity: QueueCapacity,
    policy: OverflowPolicy,
    panic_sink: Option<PanicSink>,
    activity: ActivityBroadcast,
    next_task_id: AtomicCell<u64>,
}

// SAFETY: the UnsafeCell is only dereferenced while queue_lock is held,
// which serializes every access across threads; everything else in the
// struct is Sync on its own.
unsafe impl Sync for PoolShared {}
// SAFETY: PoolQueue contains only Send contents (boxed Send closures).
unsafe impl Send for PoolShared {}

impl PoolShared {
    /// Callers must hold `queue_lock`, and must not keep the returned
    /// reference alive across a condition wait (the wait releases the
    /// lock).
    #[allow(clippy::mut_from_ref)]
    unsafe fn queue_mut(&self) -> &mut PoolQueue {
        unsafe { &mut *self.queue.get() }
    }
}

/// A fixed set of worker threads consuming one shared task queue.
///
/// # Examples
///
/// ```
/// use synckit_pool::WorkerPool;
///
/// let pool = WorkerPool::new(2);
/// let handle = pool.submit(|| 2 + 2).unwrap();
/// assert_eq!(handle.join().unwrap(), 4);
/// pool.shutdown(None);
/// ```
pub struct WorkerPool {
    shared: Arc<PoolShared>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    activity_receiver: Option<Receiver<PoolActivity>>,
}

impl WorkerPool {
    /// Creates a pool with `worker_count` threads and default
    /// configuration (unbounded queue).
    #[must_use]
    pub fn new(worker_count: usize) -> Self {
        WorkerPoolBuilder::new(worker_count).build()
    }

    /// Starts configuring a pool.
    #[must_use]
    pub fn builder(worker_count: usize) -> WorkerPoolBuilder {
        WorkerPoolBuilder::new(worker_count)
    }

    pub(crate) fn from_builder(builder: WorkerPoolBuilder) -> Self {
        let (activity, activity_receiver) = if builder.activity {
            let (broadcast, receiver) = ActivityBroadcast::enabled();
            (broadcast, Some(receiver))
        } else {
            (ActivityBroadcast::disabled(), None)
        };

        let queue_lock = Arc::new(ExclusiveLock::new());
        let shared = Arc::new(PoolShared {
            not_empty: ConditionVariable::for_lock(&queue_lock),
            not_full: ConditionVariable::for_lock(&queue_lock),
            progress: ConditionVariable::for_lock(&queue_lock),
            queue_lock,
            queue: UnsafeCell::new(PoolQueue {
                state: PoolState::Running,
                tasks: VecDeque::new(),
                ordinary_pending: 0,
                busy_background: 0,
                live_workers: builder.worker_count,
            }),
            capacity: builder.queue_capacity,
            policy: builder.overflow_policy,
            panic_sink: builder.panic_sink,
            activity,
            next_task_id: AtomicCell::new(1),
        });

        let handles = (0..builder.worker_count)
            .map(|index| {
                let shared = Arc::clone(&shared);
                thread::Builder::new()
                    .name(format!("{}-{index}", builder.thread_name_prefix))
                    .spawn(move || worker_loop(index, &shared))
                    .expect("failed to spawn worker thread")
            })
            .collect();

        tracing::debug!(workers = builder.worker_count, "worker pool started");
        Self {
            shared,
            handles: Mutex::new(handles),
            activity_receiver,
        }
    }

    /// Submits a closure for execution and returns its handle.
    ///
    /// # Errors
    ///
    /// [`SubmitError::ShuttingDown`] once [`shutdown`] has been called,
    /// or [`SubmitError::QueueFull`] when a bounded queue is full under
    /// the `Reject` policy. Under `Block` the submitter parks until a
    /// slot frees; under `Grow` the bound is ignored.
    ///
    /// [`shutdown`]: WorkerPool::shutdown
    pub fn submit<F, T>(&self, body: F) -> Result<TaskHandle<T>, SubmitError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.submit_inner(body, false)
    }

    /// Like [`submit`](WorkerPool::submit), but marks the task as
    /// background: shutdown neither waits for it nor guarantees it runs.
    ///
    /// # Errors
    ///
    /// Same as [`submit`](WorkerPool::submit).
    pub fn submit_background<F, T>(&self, body: F) -> Result<TaskHandle<T>, SubmitError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.submit_inner(body, true)
    }

    fn submit_inner<F, T>(&self, body: F, background: bool) -> Result<TaskHandle<T>, SubmitError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let id = TaskId(self.shared.next_task_id.fetch_add(1));
        let (task, handle) = create_task(id, background, body);

        let Ok(_guard) = self.shared.queue_lock.guard() else {
            return Err(SubmitError::ShuttingDown);
        };

        loop {
            // SAFETY: queue_lock is held; the reference does not
            // survive past the wait below.
            let queue = unsafe { self.shared.queue_mut() };
            if queue.state != PoolState::Running {
                return Err(SubmitError::ShuttingDown);
            }
            match self.shared.capacity {
                QueueCapacity::Bounded(capacity) if queue.tasks.len() >= capacity => {
                    match self.shared.policy {
                        OverflowPolicy::Reject => {
                            return Err(SubmitError::QueueFull { capacity });
                        }
                        OverflowPolicy::Grow => break,
                        OverflowPolicy::Block => {
                            if self.shared.not_full.wait().is_err() {
                                return Err(SubmitError::ShuttingDown);
                            }
                        }
                    }
                }
                _ => break,
            }
        }

        // SAFETY: queue_lock is still held after any Block waits.
        let queue = unsafe { self.shared.queue_mut() };
        queue.tasks.push_back(task);
        if !background {
            queue.ordinary_pending += 1;
        }
        self.shared.not_empty.signal_one();
        self.shared.activity.emit(PoolActivity::TaskQueued { task: id });
        Ok(handle)
    }

    /// The pool's current lifecycle state.
    #[must_use]
    pub fn state(&self) -> PoolState {
        let Ok(_guard) = self.shared.queue_lock.guard() else {
            return PoolState::Terminated;
        };
        // SAFETY: queue_lock is held.
        unsafe { self.shared.queue_mut() }.state
    }

    /// Number of tasks currently waiting in the queue.
    #[must_use]
    pub fn queued_tasks(&self) -> usize {
        let Ok(_guard) = self.shared.queue_lock.guard() else {
            return 0;
        };
        // SAFETY: queue_lock is held.
        unsafe { self.shared.queue_mut() }.tasks.len()
    }

    /// The activity stream, when the pool was built with
    /// [`with_activity_channel`](WorkerPoolBuilder::with_activity_channel).
    #[must_use]
    pub fn activity_events(&self) -> Option<Receiver<PoolActivity>> {
        self.activity_receiver.clone()
    }

    /// Stops accepting submissions, waits for every ordinary task to
    /// finish and for the workers to exit, then terminates the pool.
    ///
    /// Queued background tasks that never ran are marked cancelled on
    /// their handles; workers still executing a background task are not
    /// waited for (daemon semantics) and finish on their own.
    ///
    /// With a `timeout`, returns [`ShutdownOutcome::TimedOut`] when the
    /// deadline passes first; the pool keeps draining in the background
    /// and `shutdown` may be called again.
    pub fn shutdown(&self, timeout: Option<Duration>) -> ShutdownOutcome {
        let deadline = timeout.map(|timeout| Instant::now() + timeout);

        let Ok(_guard) = self.shared.queue_lock.guard() else {
            return ShutdownOutcome::Completed;
        };

        {
            // SAFETY: queue_lock is held.
            let queue = unsafe { self.shared.queue_mut() };
            if queue.state == PoolState::Running {
                queue.state = PoolState::Draining;
                tracing::debug!("pool drain requested");
                self.shared.activity.emit(PoolActivity::DrainRequested);
                // idle workers must observe the drain, blocked
                // submitters must observe the rejection
                self.shared.not_empty.signal_all();
                self.shared.not_full.signal_all();
            }
        }

        let mut discarded: Vec<QueuedTask> = Vec::new();
        let mut flipped = false;
        let outcome = loop {
            // SAFETY: queue_lock is held; reference dropped before wait.
            let queue = unsafe { self.shared.queue_mut() };

            if queue.state != PoolState::Terminated && queue.ordinary_pending == 0 {
                queue.state = PoolState::Terminated;
                flipped = true;
                discarded.extend(queue.tasks.drain(..));
                self.shared.not_empty.signal_all();
                self.shared.not_full.signal_all();
            }

            if queue.state == PoolState::Terminated
                && queue.live_workers <= queue.busy_background
            {
                break ShutdownOutcome::Completed;
            }

            let unfinished = queue.ordinary_pending;
            match deadline {
                None => {
                    if self.shared.progress.wait().is_err() {
                        break ShutdownOutcome::TimedOut { unfinished };
                    }
                }
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        break ShutdownOutcome::TimedOut { unfinished };
                    }
                    if self.shared.progress.wait_timeout(deadline - now).is_err() {
                        break ShutdownOutcome::TimedOut { unfinished };
                    }
                }
            }
        };

        let stragglers = {
            // SAFETY: queue_lock is held.
            unsafe { self.shared.queue_mut() }.busy_background
        };
        drop(_guard);

        // discarded tasks never ran; resolve their handles
        for task in discarded {
            tracing::debug!(task = %task.id, "discarding queued background task");
            (task.cancel)();
        }

        if flipped {
            tracing::debug!("pool terminated");
            self.shared.activity.emit(PoolActivity::Terminated);
        }

        if outcome == ShutdownOutcome::Completed && stragglers == 0 {
            let handles = {
                let mut handles = self
                    .handles
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                std::mem::take(&mut *handles)
            };
            for handle in handles {
                if handle.join().is_err() {
                    tracing::error!("worker thread panicked outside a task");
                }
            }
        }

        outcome
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // drain only if nobody asked for shutdown before; a pool
        // already draining or timed out must not block the drop
        if self.state() == PoolState::Running {
            let _ = self.shutdown(None);
        }
    }
}

fn worker_loop(index: usize, shared: &PoolShared) {
    tracing::debug!(worker = index, "worker thread started");
    shared.activity.emit(PoolActivity::WorkerStarted { worker: index });

    while let Some(task) = next_task(shared) {
        let id = task.id;
        let background = task.background;
        shared
            .activity
            .emit(PoolActivity::TaskStarted { worker: index, task: id });

        match (task.run)() {
            TaskOutcome::Completed => {
                shared
                    .activity
                    .emit(PoolActivity::TaskCompleted { worker: index, task: id });
            }
            TaskOutcome::Panicked { detail } => {
                tracing::error!(
                    worker = index,
                    task = %id,
                    detail = %detail,
                    "task panicked; worker continues"
                );
                if let Some(sink) = &shared.panic_sink {
                    sink(id, &detail);
                }
                shared
                    .activity
                    .emit(PoolActivity::TaskPanicked { worker: index, task: id });
            }
        }

        finish_task(shared, background);
    }

    tracing::debug!(worker = index, "worker thread exiting");
    shared.activity.emit(PoolActivity::WorkerStopped { worker: index });
}

/// Blocks until a task is available or the pool winds down; `None`
/// tells the worker to exit.
fn next_task(shared: &PoolShared) -> Option<QueuedTask> {
    let Ok(_guard) = shared.queue_lock.guard() else {
        return None;
    };

    loop {
        // SAFETY: queue_lock is held; reference dropped before wait.
        let queue = unsafe { shared.queue_mut() };

        if queue.state == PoolState::Terminated {
            queue.live_workers -= 1;
            shared.progress.signal_all();
            return None;
        }

        if let Some(task) = queue.tasks.pop_front() {
            if task.background {
                queue.busy_background += 1;
            }
            shared.not_full.signal_one();
            return Some(task);
        }

        if queue.state == PoolState::Draining {
            queue.live_workers -= 1;
            shared.progress.signal_all();
            return None;
        }

        if shared.not_empty.wait().is_err() {
            // SAFETY: queue_lock is held (wait only fails before
            // releasing).
            let queue = unsafe { shared.queue_mut() };
            queue.live_workers -= 1;
            shared.progress.signal_all();
            return None;
        }
    }
}

/// Updates the lifecycle counters after a task body ran.
fn finish_task(shared: &PoolShared, background: bool) {
    let Ok(_guard) = shared.queue_lock.guard() else {
        return;
    };
    // SAFETY: queue_lock is held.
    let queue = unsafe { shared.queue_mut() };
    if background {
        queue.busy_background -= 1;
    } else {
        queue.ordinary_pending -= 1;
        if queue.ordinary_pending == 0 && queue.state != PoolState::Running {
            shared.progress.signal_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn executes_submitted_tasks() {
        let pool = WorkerPool::new(2);
        let handle = pool.submit(|| 40 + 2).unwrap();
        assert_eq!(handle.join().unwrap(), 42);
        assert_eq!(pool.shutdown(None), ShutdownOutcome::Completed);
    }

    #[test]
    fn rejects_after_shutdown() {
        let pool = WorkerPool::new(1);
        assert_eq!(pool.shutdown(None), ShutdownOutcome::Completed);
        assert_eq!(pool.state(), PoolState::Terminated);
        assert_eq!(
            pool.submit(|| ()).map(|handle| handle.id()),
            Err(SubmitError::ShuttingDown)
        );
    }

    #[test]
    #[ntest::timeout(60000)]
    fn shutdown_waits_for_ordinary_tasks() {
        let pool = WorkerPool::new(2);
        let done = Arc::new(AtomicUsize::new(0));
        for _ in 0..8 {
            let done = Arc::clone(&done);
            pool.submit(move || {
                thread::sleep(Duration::from_millis(10));
                done.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }
        assert_eq!(pool.shutdown(None), ShutdownOutcome::Completed);
        assert_eq!(done.load(Ordering::SeqCst), 8);
    }

    #[test]
    fn shutdown_timeout_reports_unfinished() {
        let pool = WorkerPool::new(1);
        let slow = pool
            .submit(|| thread::sleep(Duration::from_millis(300)))
            .unwrap();
        let outcome = pool.shutdown(Some(Duration::from_millis(30)));
        assert!(matches!(outcome, ShutdownOutcome::TimedOut { unfinished: 1 }));

        // a second, untimed shutdown finishes the drain
        assert_eq!(pool.shutdown(None), ShutdownOutcome::Completed);
        assert!(slow.is_finished());
    }

    #[test]
    fn panicking_task_does_not_kill_worker() {
        let reported = Arc::new(AtomicUsize::new(0));
        let sink_reported = Arc::clone(&reported);
        let pool = WorkerPool::builder(1)
            .on_task_panic(move |_id, _detail| {
                sink_reported.fetch_add(1, Ordering::SeqCst);
            })
            .build();

        let failing = pool.submit(|| -> u32 { panic!("bad task") }).unwrap();
        let following = pool.submit(|| 7).unwrap();

        assert!(failing.join().is_err());
        assert_eq!(following.join().unwrap(), 7);
        assert_eq!(reported.load(Ordering::SeqCst), 1);
        assert_eq!(pool.shutdown(None), ShutdownOutcome::Completed);
    }

    #[test]
    fn bounded_reject_policy_fails_fast() {
        let pool = WorkerPool::builder(1)
            .queue(QueueCapacity::Bounded(1))
            .build();

        // occupy the only worker, then fill the single queue slot
        let gate = Arc::new(AtomicUsize::new(0));
        let worker_gate = Arc::clone(&gate);
        pool.submit(move || {
            while worker_gate.load(Ordering::SeqCst) == 0 {
                thread::sleep(Duration::from_millis(1));
            }
        })
        .unwrap();
        thread::sleep(Duration::from_millis(30));
        pool.submit(|| ()).unwrap();

        assert_eq!(
            pool.submit(|| ()).map(|handle| handle.id()),
            Err(SubmitError::QueueFull { capacity: 1 })
        );

        gate.store(1, Ordering::SeqCst);
        assert_eq!(pool.shutdown(None), ShutdownOutcome::Completed);
    }
}
