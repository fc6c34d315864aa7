//! Pool lifecycle notifications.
//!
//! When a pool is built with an activity channel, it reports worker and
//! task lifecycle transitions as [`PoolActivity`] values over a
//! `crossbeam` channel. Delivery is fire-and-forget: a dropped receiver
//! never blocks or fails the pool.

use crossbeam::channel::{unbounded, Receiver, Sender};

use crate::task::TaskId;

/// One observable transition in a pool's life.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolActivity {
    /// A worker thread entered its serving loop.
    WorkerStarted {
        /// Index of the worker within the pool.
        worker: usize,
    },

    /// A worker thread left its serving loop.
    WorkerStopped {
        /// Index of the worker within the pool.
        worker: usize,
    },

    /// A task was accepted into the queue.
    TaskQueued {
        /// The accepted task.
        task: TaskId,
    },

    /// A worker picked the task up and began executing it.
    TaskStarted {
        /// Executing worker.
        worker: usize,
        /// The task being executed.
        task: TaskId,
    },

    /// The task body returned normally.
    TaskCompleted {
        /// Executing worker.
        worker: usize,
        /// The finished task.
        task: TaskId,
    },

    /// The task body panicked; the panic was confined to its handle.
    TaskPanicked {
        /// The worker that survived the panic.
        worker: usize,
        /// The failed task.
        task: TaskId,
    },

    /// Shutdown was requested; no further submissions are accepted.
    DrainRequested,

    /// Every ordinary task finished and the pool reached its final
    /// state.
    Terminated,
}

/// Optional fire-and-forget sender for [`PoolActivity`] values.
pub(crate) struct ActivityBroadcast {
    sender: Option<Sender<PoolActivity>>,
}

impl ActivityBroadcast {
    pub(crate) fn disabled() -> Self {
        Self { sender: None }
    }

    pub(crate) fn enabled() -> (Self, Receiver<PoolActivity>) {
        let (sender, receiver) = unbounded();
        (
            Self {
                sender: Some(sender),
            },
            receiver,
        )
    }

    pub(crate) fn emit(&self, activity: PoolActivity) {
        if let Some(sender) = &self.sender {
            // a disconnected receiver is not an error for the pool
            let _ = sender.send(activity);
        }
    }
}
