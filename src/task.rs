//! Task status shared between a background worker thread and its observers.
//!
//! The worker owns a [`TaskControl`]; everyone else holds cheap clones of
//! [`TaskStatus`]. Flags only ever move forward (`started` then `finished`),
//! and the error slot is written at most once. Observers never touch task
//! internals beyond requesting cancellation.

use crate::error::{Error, Result};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Which kind of background task a status belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    /// A background read.
    Read,
    /// A background write.
    Write,
}

/// Coarse lifecycle state derived from the task flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    /// Created, not yet doing I/O (includes waiting on a chained predecessor).
    Pending,
    /// Doing I/O.
    Running,
    /// Completed cleanly.
    Finished,
    /// Stopped with an error, cancellation or expired deadline.
    Failed,
}

#[derive(Debug)]
struct Shared {
    kind: TaskKind,
    started: AtomicBool,
    finished: AtomicBool,
    cancelled: AtomicBool,
    error: OnceLock<Error>,
    cancel_tx: Sender<()>,
    done_rx: Receiver<()>,
}

/// Observer handle for a background task.
///
/// Cloning is cheap; all clones see the same task.
#[derive(Debug, Clone)]
pub struct TaskStatus {
    shared: Arc<Shared>,
}

impl TaskStatus {
    /// Kind of task this status belongs to.
    pub fn kind(&self) -> TaskKind {
        self.shared.kind
    }

    /// Whether the task has begun its I/O.
    pub fn has_started(&self) -> bool {
        self.shared.started.load(Ordering::Acquire)
    }

    /// Whether the task completed cleanly. Never reset once true.
    pub fn is_finished(&self) -> bool {
        self.shared.finished.load(Ordering::Acquire)
    }

    /// The error that stopped the task, if any.
    pub fn error(&self) -> Option<&Error> {
        self.shared.error.get()
    }

    /// Whether the task failed (error, cancellation or deadline).
    pub fn is_failed(&self) -> bool {
        self.shared.error.get().is_some()
    }

    /// Whether the task has stopped, cleanly or not.
    pub fn is_done(&self) -> bool {
        self.is_finished() || self.is_failed()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TaskState {
        if self.is_finished() {
            TaskState::Finished
        } else if self.is_failed() {
            TaskState::Failed
        } else if self.has_started() {
            TaskState::Running
        } else {
            TaskState::Pending
        }
    }

    /// Ask the task to stop at its next loop iteration or sleep.
    pub fn cancel(&self) {
        self.shared.cancelled.store(true, Ordering::Release);
        let _ = self.shared.cancel_tx.try_send(());
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.shared.cancelled.load(Ordering::Acquire)
    }

    /// Block until the worker thread has exited.
    ///
    /// Returns immediately if it already has.
    pub fn wait(&self) {
        let _ = self.shared.done_rx.recv();
    }

    /// Block up to `timeout` for the worker thread to exit.
    ///
    /// Returns `true` if it exited in time.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        !matches!(
            self.shared.done_rx.recv_timeout(timeout),
            Err(RecvTimeoutError::Timeout)
        )
    }
}

/// Worker side of a task: flips the flags, records errors, sleeps.
///
/// Dropping it (when the worker thread exits) releases every waiter.
#[derive(Debug)]
pub(crate) struct TaskControl {
    shared: Arc<Shared>,
    cancel_rx: Receiver<()>,
    deadline: Option<Instant>,
    _done_tx: Sender<()>,
}

impl TaskControl {
    /// Create a worker/observer pair.
    pub(crate) fn new(kind: TaskKind, deadline: Option<Duration>) -> (Self, TaskStatus) {
        let (cancel_tx, cancel_rx) = bounded(1);
        let (done_tx, done_rx) = bounded(0);
        let shared = Arc::new(Shared {
            kind,
            started: AtomicBool::new(false),
            finished: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
            error: OnceLock::new(),
            cancel_tx,
            done_rx,
        });
        let control = Self {
            shared: Arc::clone(&shared),
            cancel_rx,
            deadline: deadline.map(|d| Instant::now() + d),
            _done_tx: done_tx,
        };
        (control, TaskStatus { shared })
    }

    pub(crate) fn mark_started(&self) {
        self.shared.started.store(true, Ordering::Release);
    }

    pub(crate) fn mark_finished(&self) {
        self.shared.finished.store(true, Ordering::Release);
    }

    /// Record the error that ends the task. Later errors are dropped.
    pub(crate) fn fail(&self, error: Error) {
        log::warn!("{:?} task failed: {error}", self.shared.kind);
        let _ = self.shared.error.set(error);
    }

    /// Fail fast if the task was cancelled or ran out of time.
    pub(crate) fn checkpoint(&self) -> Result<()> {
        if self.shared.cancelled.load(Ordering::Acquire) {
            return Err(Error::Cancelled);
        }
        if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Err(Error::DeadlineExceeded);
        }
        Ok(())
    }

    /// Sleep for `duration`, waking early on cancellation.
    ///
    /// The sleep is cut short at the deadline, which is then reported.
    pub(crate) fn sleep(&self, duration: Duration) -> Result<()> {
        self.checkpoint()?;
        if duration.is_zero() {
            return Ok(());
        }
        let duration = match self.deadline {
            Some(deadline) => duration.min(deadline.saturating_duration_since(Instant::now())),
            None => duration,
        };
        let _ = self.cancel_rx.recv_timeout(duration);
        self.checkpoint()
    }

    /// Move the control onto a named worker thread running `body`.
    ///
    /// An `Err` from `body` lands in the error slot, and so does a panic, as
    /// [`Error::Panicked`]. `Ok` does not set `finished` by itself; the body
    /// decides when that happens.
    pub(crate) fn spawn<F>(self, name: &str, body: F) -> Result<JoinHandle<()>>
    where
        F: FnOnce(&Self) -> Result<()> + Send + 'static,
    {
        thread::Builder::new()
            .name(name.to_string())
            .spawn(move || match panic::catch_unwind(AssertUnwindSafe(|| body(&self))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => self.fail(e),
                Err(payload) => self.fail(Error::Panicked(panic_message(payload.as_ref()))),
            })
            .map_err(Error::Spawn)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
