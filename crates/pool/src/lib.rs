//! Bounded worker-pool dispatcher built on `synckit_primitives`.
//!
//! The pool never looks inside a task: a submission is an opaque
//! `FnOnce() -> T` closure, and the pool's job is purely the
//! concurrency harness around it — queueing with a configurable
//! overflow policy, exactly-once execution, panic isolation per task,
//! and an orderly drain on shutdown. [`PeriodicTask`] covers recurring
//! work the same way.

// Public modules
pub mod activity;
pub mod builder;
pub mod errors;
pub mod pool;
pub mod scheduled;
pub mod task;

// Re-export pool types
pub use pool::{PoolState, ShutdownOutcome, WorkerPool};

// Re-export configuration types
pub use builder::{OverflowPolicy, PanicSink, QueueCapacity, WorkerPoolBuilder};

// Re-export task types
pub use task::{TaskHandle, TaskId};

// Re-export error and event types
pub use activity::PoolActivity;
pub use errors::{SubmitError, TaskError};

// Re-export the periodic runner
pub use scheduled::PeriodicTask;
