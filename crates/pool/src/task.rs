//! Tasks and their completion handles.
//!
//! A submitted closure is erased into a [`QueuedTask`] owned by the
//! pool; the submitter keeps a [`TaskHandle`] — the promise side of the
//! pair. Exactly one of three things happens to every task: it runs to
//! completion, it panics (captured on the handle), or the pool
//! terminates before it runs (handle reports
//! [`TaskError::Cancelled`]).

use std::any::Any;
use std::fmt;
use std::mem;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::errors::TaskError;

/// Identifier assigned to each submitted task, unique per pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub(crate) u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// What a worker learns after running a task body.
pub(crate) enum TaskOutcome {
    Completed,
    Panicked {
        detail: String,
    },
}

pub(crate) type TaskFn = Box<dyn FnOnce() -> TaskOutcome + Send>;

/// A type-erased task as it sits in the pool queue.
pub(crate) struct QueuedTask {
    pub(crate) id: TaskId,
    pub(crate) background: bool,
    pub(crate) run: TaskFn,
    /// Marks the handle cancelled when the task is discarded unrun.
    pub(crate) cancel: Box<dyn FnOnce() + Send>,
}

enum Slot<T> {
    Pending,
    Done(Result<T, TaskError>),
    Taken,
}

struct HandleShared<T> {
    slot: Mutex<Slot<T>>,
    done: Condvar,
}

impl<T> HandleShared<T> {
    fn complete(&self, result: Result<T, TaskError>) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        debug_assert!(matches!(*slot, Slot::Pending));
        *slot = Slot::Done(result);
        drop(slot);
        self.done.notify_all();
    }
}

/// The caller's side of a submitted task: a completion flag plus a
/// result slot whose ownership transfers to whoever joins the handle.
pub struct TaskHandle<T> {
    shared: Arc<HandleShared<T>>,
    id: TaskId,
    background: bool,
}

impl<T> TaskHandle<T> {
    /// The pool-assigned id of this task.
    #[must_use]
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Whether the task was submitted as a background (daemon) task.
    #[must_use]
    pub fn is_background(&self) -> bool {
        self.background
    }

    /// Whether the task has finished (completed, panicked or been
    /// discarded).
    #[must_use]
    pub fn is_finished(&self) -> bool {
        let slot = self
            .shared
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        !matches!(*slot, Slot::Pending)
    }

    /// Blocks for up to `timeout`; returns `true` once the task has
    /// finished. The handle stays usable either way.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut slot = self
            .shared
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        loop {
            if !matches!(*slot, Slot::Pending) {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (reacquired, _outcome) = self
                .shared
                .done
                .wait_timeout(slot, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            slot = reacquired;
        }
    }

    /// Blocks until the task finishes and takes its result.
    ///
    /// # Errors
    ///
    /// [`TaskError::Panicked`] when the body panicked,
    /// [`TaskError::Cancelled`] when the pool discarded the task, or
    /// [`TaskError::ResultTaken`] when `try_join` already consumed the
    /// result.
    pub fn join(self) -> Result<T, TaskError> {
        let mut slot = self
            .shared
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        loop {
            match &*slot {
                Slot::Pending => {
                    slot = self
                        .shared
                        .done
                        .wait(slot)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                Slot::Taken => return Err(TaskError::ResultTaken),
                Slot::Done(_) => match mem::replace(&mut *slot, Slot::Taken) {
                    Slot::Done(result) => return result,
                    _ => unreachable!("slot state checked above"),
                },
            }
        }
    }

    /// Takes the result if the task has already finished.
    ///
    /// Returns `None` while the task is still pending. After a
    /// successful `try_join`, later accessors see
    /// [`TaskError::ResultTaken`].
    pub fn try_join(&self) -> Option<Result<T, TaskError>> {
        let mut slot = self
            .shared
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match &*slot {
            Slot::Pending => None,
            Slot::Taken => Some(Err(TaskError::ResultTaken)),
            Slot::Done(_) => match mem::replace(&mut *slot, Slot::Taken) {
                Slot::Done(result) => Some(result),
                _ => unreachable!("slot state checked above"),
            },
        }
    }
}

impl<T> fmt::Debug for TaskHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("id", &self.id)
            .field("background", &self.background)
            .field("finished", &self.is_finished())
            .finish()
    }
}

/// Erases a closure into a queueable task plus its handle.
pub(crate) fn create_task<T, F>(id: TaskId, background: bool, body: F) -> (QueuedTask, TaskHandle<T>)
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let shared = Arc::new(HandleShared {
        slot: Mutex::new(Slot::Pending),
        done: Condvar::new(),
    });

    let run_shared = Arc::clone(&shared);
    let run: TaskFn = Box::new(move || match catch_unwind(AssertUnwindSafe(body)) {
        Ok(value) => {
            run_shared.complete(Ok(value));
            TaskOutcome::Completed
        }
        Err(payload) => {
            let detail = panic_detail(payload.as_ref());
            run_shared.complete(Err(TaskError::Panicked {
                detail: detail.clone(),
            }));
            TaskOutcome::Panicked { detail }
        }
    });

    let cancel_shared = Arc::clone(&shared);
    let cancel: Box<dyn FnOnce() + Send> =
        Box::new(move || cancel_shared.complete(Err(TaskError::Cancelled)));

    (
        QueuedTask {
            id,
            background,
            run,
            cancel,
        },
        TaskHandle {
            shared,
            id,
            background,
        },
    )
}

fn panic_detail(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        String::from("opaque panic payload")
    }
}
