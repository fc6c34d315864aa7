//! Pool configuration.

use crate::pool::WorkerPool;
use crate::task::TaskId;

/// Queue sizing for a [`WorkerPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueCapacity {
    /// At most this many tasks may sit queued at once; what happens on
    /// overflow is decided by the [`OverflowPolicy`].
    Bounded(usize),
    /// The queue grows without limit and submissions never overflow.
    Unbounded,
}

/// What `submit` does when a bounded queue is already full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Fail the submission with `SubmitError::QueueFull`.
    #[default]
    Reject,
    /// Park the submitter until a slot frees up.
    Block,
    /// Ignore the bound for this submission and enqueue anyway.
    Grow,
}

/// Callback invoked when a task body panics: receives the task id and
/// the stringified panic payload.
pub type PanicSink = Box<dyn Fn(TaskId, &str) + Send + Sync>;

/// Builder for [`WorkerPool`].
///
/// # Examples
///
/// ```
/// use synckit_pool::{OverflowPolicy, QueueCapacity, WorkerPoolBuilder};
///
/// let pool = WorkerPoolBuilder::new(4)
///     .queue(QueueCapacity::Bounded(64))
///     .overflow_policy(OverflowPolicy::Block)
///     .thread_name_prefix("ingest")
///     .build();
/// # drop(pool);
/// ```
pub struct WorkerPoolBuilder {
    pub(crate) worker_count: usize,
    pub(crate) queue_capacity: QueueCapacity,
    pub(crate) overflow_policy: OverflowPolicy,
    pub(crate) thread_name_prefix: String,
    pub(crate) panic_sink: Option<PanicSink>,
    pub(crate) activity: bool,
}

impl WorkerPoolBuilder {
    /// Starts a builder for a pool of `worker_count` threads with an
    /// unbounded queue.
    ///
    /// # Panics
    ///
    /// Panics when `worker_count` is zero.
    #[must_use]
    pub fn new(worker_count: usize) -> Self {
        assert!(worker_count > 0, "worker pool needs at least one worker");
        Self {
            worker_count,
            queue_capacity: QueueCapacity::Unbounded,
            overflow_policy: OverflowPolicy::default(),
            thread_name_prefix: String::from("worker"),
            panic_sink: None,
            activity: false,
        }
    }

    /// Sets the queue capacity.
    #[must_use]
    pub fn queue(mut self, capacity: QueueCapacity) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Sets the behavior when a bounded queue is full.
    #[must_use]
    pub fn overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.overflow_policy = policy;
        self
    }

    /// Names worker threads `<prefix>-<index>`.
    #[must_use]
    pub fn thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Installs a callback invoked whenever a task body panics.
    ///
    /// The failure is always also recorded on the task handle; the sink
    /// exists for centralized reporting.
    #[must_use]
    pub fn on_task_panic<F>(mut self, sink: F) -> Self
    where
        F: Fn(TaskId, &str) + Send + Sync + 'static,
    {
        self.panic_sink = Some(Box::new(sink));
        self
    }

    /// Attaches an activity channel retrievable through
    /// [`WorkerPool::activity_events`].
    #[must_use]
    pub fn with_activity_channel(mut self) -> Self {
        self.activity = true;
        self
    }

    /// Spawns the workers and returns the running pool.
    #[must_use]
    pub fn build(self) -> WorkerPool {
        WorkerPool::from_builder(self)
    }
}
