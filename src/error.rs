//! Error types used by supervisors and tasks.
//!
//! This module defines three error types:
//!
//! - [`TaskError`]: what a task's `run` returns (business failures, cancellation,
//!   panics, and errors escalated up from supervised children).
//! - [`ErrChild`]: a child's outcome as seen by its supervisor: the underlying
//!   error plus its provenance (which task, and whether it came from a panic).
//! - [`UsageError`]: broken caller contracts (double resolve, double run, ...).
//!   These are never returned: they abort the offending call with a panic.
//!
//! [`TaskError`] provides helper methods (`as_label`, `as_message`) for logging.

use std::any::Any;
use std::sync::Arc;

use thiserror::Error;

/// # Errors produced by task execution.
///
/// A supervisor is itself a task, so the same type flows through every level of
/// a supervision tree. An error escalated from a child arrives wrapped in
/// [`TaskError::Child`] and is never wrapped twice.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum TaskError {
    /// Task logic failed.
    #[error("{error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Task observed that its context was cancelled.
    #[error("context canceled")]
    Canceled,

    /// Task observed that its context deadline elapsed.
    #[error("context deadline exceeded")]
    DeadlineExceeded,

    /// Task panicked with a non-error payload.
    #[error("panic: {message}")]
    Panic {
        /// Rendered panic payload.
        message: String,
    },

    /// Supervisor was told to quit aggressively before any child failed.
    #[error("supervisor aborted")]
    Aborted,

    /// Error escalated from a supervised child.
    #[error(transparent)]
    Child(ErrChild),
}

impl TaskError {
    /// Shorthand for [`TaskError::Fail`].
    ///
    /// # Example
    /// ```
    /// use treesup::TaskError;
    ///
    /// let err = TaskError::fail("boom");
    /// assert_eq!(err.to_string(), "boom");
    /// ```
    pub fn fail(error: impl std::fmt::Display) -> Self {
        TaskError::Fail {
            error: error.to_string(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use treesup::TaskError;
    ///
    /// assert_eq!(TaskError::Canceled.as_label(), "task_canceled");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Fail { .. } => "task_failed",
            TaskError::Canceled => "task_canceled",
            TaskError::DeadlineExceeded => "task_deadline_exceeded",
            TaskError::Panic { .. } => "task_panicked",
            TaskError::Aborted => "supervisor_aborted",
            TaskError::Child(_) => "child_failed",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            TaskError::Fail { error } => format!("error: {error}"),
            TaskError::Canceled => "context canceled".to_string(),
            TaskError::DeadlineExceeded => "context deadline exceeded".to_string(),
            TaskError::Panic { message } => format!("panic: {message}"),
            TaskError::Aborted => "supervisor aborted".to_string(),
            TaskError::Child(child) => {
                format!("child {}: {}", child.task(), child.error().as_message())
            }
        }
    }

    /// True for errors that only report an observed cancellation or deadline.
    pub fn is_cancellation(&self) -> bool {
        matches!(
            self.root_cause(),
            TaskError::Canceled | TaskError::DeadlineExceeded
        )
    }

    /// Unwraps nested [`TaskError::Child`] layers down to the original error.
    pub fn root_cause(&self) -> &TaskError {
        let mut cur = self;
        while let TaskError::Child(child) = cur {
            cur = child.error();
        }
        cur
    }

    /// Returns the child outcome if this error was escalated from a supervised task.
    pub fn as_child(&self) -> Option<&ErrChild> {
        match self {
            TaskError::Child(child) => Some(child),
            _ => None,
        }
    }
}

/// # A child's failure as reported to its supervisor.
///
/// Carries the original error, whether it was recovered from a panic, and the
/// fully qualified path of the task that produced it.
#[derive(Error, Debug, Clone)]
#[error("{error}")]
pub struct ErrChild {
    error: Arc<TaskError>,
    was_panic: bool,
    task: Arc<str>,
}

impl ErrChild {
    pub(crate) fn new(error: TaskError, was_panic: bool, task: impl Into<Arc<str>>) -> Self {
        Self {
            error: Arc::new(error),
            was_panic,
            task: task.into(),
        }
    }

    /// The original error returned (or panicked) by the task.
    pub fn error(&self) -> &TaskError {
        &self.error
    }

    /// True when the error was recovered from a panic rather than returned.
    pub fn was_panic(&self) -> bool {
        self.was_panic
    }

    /// Fully qualified path of the task that produced the error.
    pub fn task(&self) -> &str {
        &self.task
    }
}

/// Classifies a finished task attempt into an optional [`ErrChild`].
///
/// - a recovered panic becomes an `ErrChild` with `was_panic` set; a panic payload
///   that is itself a [`TaskError`] is kept as-is, string payloads become
///   [`TaskError::Panic`];
/// - a returned error becomes an `ErrChild` with `was_panic` clear, except an
///   already-escalated [`TaskError::Child`] which passes through untouched;
/// - `Ok(())` produces nothing.
pub(crate) fn sift(
    outcome: Result<Result<(), TaskError>, Box<dyn Any + Send>>,
    task: &Arc<str>,
) -> Option<ErrChild> {
    match outcome {
        Ok(Ok(())) => None,
        Ok(Err(TaskError::Child(child))) => Some(child),
        Ok(Err(err)) => Some(ErrChild::new(err, false, Arc::clone(task))),
        Err(payload) => Some(ErrChild::new(panic_error(payload), true, Arc::clone(task))),
    }
}

fn panic_error(payload: Box<dyn Any + Send>) -> TaskError {
    let payload = match payload.downcast::<TaskError>() {
        Ok(err) => return *err,
        Err(other) => other,
    };
    let message = if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    };
    TaskError::Panic { message }
}

/// # Broken caller contracts.
///
/// These indicate a programming error rather than a runtime condition, so the
/// library raises them with `panic!` instead of returning them.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum UsageError {
    /// A promise resolver was used more than once.
    #[error("promise resolved more than once")]
    ResolvedTwice,

    /// A supervisor's `run` was invoked more than once.
    #[error("supervisor {supervisor:?} can only be run once")]
    RunTwice {
        /// Name of the supervisor.
        supervisor: String,
    },

    /// The name selection strategy never produced a free name.
    #[error("no free task name for {requested:?} after {attempts} attempts")]
    NameExhausted {
        /// The requested name.
        requested: String,
        /// How many proposals were tried.
        attempts: usize,
    },

    /// `set_return_on_empty` was called after the supervisor left its running phase.
    #[error("return-on-empty cannot change on supervisor {supervisor:?} after it stopped running")]
    ReturnOnEmptyAfterRunning {
        /// Name of the supervisor.
        supervisor: String,
    },
}
