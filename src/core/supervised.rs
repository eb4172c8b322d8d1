//! # Handles for submitted tasks.
//!
//! [`SupervisedTask`] is what [`Supervisor::submit`](crate::Supervisor::submit)
//! returns. It stays inspectable after the task finished, independently of
//! whether its error became the supervisor's aggregate result.
//!
//! ```text
//! submit ──► Gated ──(supervisor running)──► Running ──(run returned)──► Done
//!                                                                         │
//!                                        error slot filled, promise resolved
//! ```

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use crate::core::supervisor::{Supervisor, SupervisorInner};
use crate::error::ErrChild;
use crate::promise::{Promise, Resolver};
use crate::tasks::{BoundTask, TaskRef};

/// Execution phase of a supervised task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskPhase {
    /// Registered, waiting for its supervisor to start running.
    Gated,
    /// Launched.
    Running,
    /// Returned (or panicked); the outcome is final.
    Done,
}

impl TaskPhase {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => TaskPhase::Gated,
            1 => TaskPhase::Running,
            _ => TaskPhase::Done,
        }
    }
}

/// Outcome delivered through [`SupervisedTask::promise`].
#[derive(Debug, Clone)]
pub struct TaskReport {
    name: Arc<str>,
    path: Arc<str>,
    error: Option<ErrChild>,
}

impl TaskReport {
    /// Resolved short name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fully qualified path the task ran under.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The task's own error, if it failed or panicked.
    pub fn error(&self) -> Option<&ErrChild> {
        self.error.as_ref()
    }

    /// True when the task returned `Ok(())`.
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

struct TaskInner {
    bound: BoundTask,
    name: Arc<str>,
    path: OnceLock<Arc<str>>,
    parent: Weak<SupervisorInner>,
    phase: AtomicU8,
    lame: AtomicBool,
    error: OnceLock<Option<ErrChild>>,
    promise: Promise<TaskReport>,
    resolver: Resolver<TaskReport>,
}

/// Handle to a task registered with a supervisor.
///
/// Cheap to clone. Holds only a non-owning reference to the supervisor.
#[derive(Clone)]
pub struct SupervisedTask {
    inner: Arc<TaskInner>,
}

impl SupervisedTask {
    pub(crate) fn new(bound: BoundTask, name: Arc<str>, parent: Weak<SupervisorInner>) -> Self {
        let (promise, resolver) = Promise::new();
        Self {
            inner: Arc::new(TaskInner {
                bound,
                name,
                path: OnceLock::new(),
                parent,
                phase: AtomicU8::new(TaskPhase::Gated as u8),
                lame: AtomicBool::new(false),
                error: OnceLock::new(),
                promise,
                resolver,
            }),
        }
    }

    /// Resolved short name (unique among its live siblings).
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Fully qualified path, known once the task was launched.
    pub fn path(&self) -> Option<&str> {
        self.inner.path.get().map(|p| &**p)
    }

    /// Current phase.
    pub fn phase(&self) -> TaskPhase {
        TaskPhase::from_u8(self.inner.phase.load(Ordering::Acquire))
    }

    /// The task's own outcome: `None` while running or on success.
    pub fn error(&self) -> Option<&ErrChild> {
        self.inner.error.get().and_then(Option::as_ref)
    }

    /// True if the task was submitted after its supervisor began winding down.
    pub fn is_lame(&self) -> bool {
        self.inner.lame.load(Ordering::Acquire)
    }

    /// The supervisor this task was submitted to, while it is alive.
    pub fn parent(&self) -> Option<Supervisor> {
        self.inner.parent.upgrade().map(Supervisor::from_inner)
    }

    /// The wrapped task.
    pub fn task(&self) -> &TaskRef {
        self.inner.bound.task()
    }

    /// Promise resolved once the task is done.
    pub fn promise(&self) -> Promise<TaskReport> {
        self.inner.promise.clone()
    }

    pub(crate) fn name_arc(&self) -> &Arc<str> {
        &self.inner.name
    }

    pub(crate) fn same(&self, other: &SupervisedTask) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn mark_lame(&self) {
        self.inner.lame.store(true, Ordering::Release);
    }

    pub(crate) fn start(&self, path: Arc<str>) {
        let _ = self.inner.path.set(path);
        self.inner
            .phase
            .store(TaskPhase::Running as u8, Ordering::Release);
    }

    /// Fills the error slot and resolves the promise. Called once per task.
    pub(crate) fn complete(&self, error: Option<ErrChild>) {
        let path = self
            .inner
            .path
            .get()
            .cloned()
            .unwrap_or_else(|| Arc::clone(&self.inner.name));
        let _ = self.inner.error.set(error.clone());
        self.inner.phase.store(TaskPhase::Done as u8, Ordering::Release);
        self.inner.resolver.resolve(TaskReport {
            name: Arc::clone(&self.inner.name),
            path,
            error,
        });
    }
}

impl std::fmt::Debug for SupervisedTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupervisedTask")
            .field("name", &self.name())
            .field("path", &self.path())
            .field("phase", &self.phase())
            .field("lame", &self.is_lame())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Context;
    use crate::error::TaskError;
    use crate::tasks::TaskFn;

    fn handle() -> SupervisedTask {
        let task: TaskRef = TaskFn::arc(|_ctx: Context| async { Ok::<_, TaskError>(()) });
        SupervisedTask::new(BoundTask::bind_as(task, "job"), Arc::from("job"), Weak::new())
    }

    #[test]
    fn completion_fills_slot_and_promise() {
        let t = handle();
        assert_eq!(t.phase(), TaskPhase::Gated);
        t.start(Arc::from("main/job"));
        assert_eq!(t.phase(), TaskPhase::Running);

        t.complete(Some(ErrChild::new(TaskError::fail("x"), false, "main/job")));
        assert_eq!(t.phase(), TaskPhase::Done);
        assert_eq!(t.error().map(|e| e.task()), Some("main/job"));

        let report = t.promise().value().cloned().unwrap();
        assert_eq!(report.name(), "job");
        assert_eq!(report.path(), "main/job");
        assert!(!report.is_ok());
        assert!(t.parent().is_none());
    }
}
