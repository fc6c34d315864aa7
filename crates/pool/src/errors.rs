//! Error types for task submission and task results.

use thiserror::Error;

/// Why a submission was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SubmitError {
    /// The pool is draining or terminated and accepts no new tasks.
    #[error("pool is draining or terminated and no longer accepts tasks")]
    ShuttingDown,

    /// The bounded queue is full and the overflow policy rejects.
    #[error("task queue is full (capacity {capacity})")]
    QueueFull {
        /// The configured queue capacity.
        capacity: usize,
    },
}

/// Why a task handle carries no value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    /// The task body panicked. The panic is confined to this handle;
    /// the worker that ran the task keeps serving.
    #[error("task panicked: {detail}")]
    Panicked {
        /// Stringified panic payload.
        detail: String,
    },

    /// The task was still queued when the pool terminated and will
    /// never run.
    #[error("task discarded before execution during pool termination")]
    Cancelled,

    /// The result was already taken through another accessor.
    #[error("task result already taken")]
    ResultTaken,
}
