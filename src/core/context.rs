//! # Task context: cancellation plus "who am I / who supervises me".
//!
//! A [`Context`] is handed to every task. It carries:
//! - a [`CancellationToken`] shared with the owning supervisor's children,
//! - an optional deadline,
//! - one attachment bundle {supervisor, task handle, short name, full path}.
//!
//! ## Derivation
//! ```text
//! run ctx (parent) ──child()──► children ctx (one per supervisor run)
//!                                  └─ attach(..) per launched task: same token,
//!                                     one merged attachment object (O(1) per level)
//! ```
//!
//! Outside any supervision tree the names read `"[unmanaged]"` and
//! [`Context::supervisor`] is `None`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, DropGuard, WaitForCancellationFuture};

use crate::core::supervised::SupervisedTask;
use crate::core::supervisor::{Supervisor, SupervisorInner};
use crate::error::TaskError;

const UNMANAGED: &str = "[unmanaged]";

/// Attachment bundle carried through the context tree.
pub(crate) struct Attachments {
    pub(crate) supervisor: Weak<SupervisorInner>,
    pub(crate) task: SupervisedTask,
    pub(crate) short_name: Arc<str>,
    pub(crate) path: Arc<str>,
}

/// Deadline shared by every context derived from the one that set it.
///
/// `expired` is set by the timer before it cancels, so a context cancelled
/// any other way never reads as past its deadline. The timer task stops once
/// the last context holding this value is dropped.
struct Deadline {
    at: Instant,
    expired: AtomicBool,
    _timer: DropGuard,
}

/// Cancellable context passed to [`Task::run`](crate::Task::run).
#[derive(Clone)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Arc<Deadline>>,
    info: Option<Arc<Attachments>>,
}

impl Context {
    /// A fresh root context: never cancelled unless [`Context::cancel`] is called.
    pub fn background() -> Self {
        Self::from_token(CancellationToken::new())
    }

    /// A root context driven by an existing token.
    pub fn from_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
            info: None,
        }
    }

    /// A context cancelled with this one, which can also be cancelled on its own.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline.clone(),
            info: self.info.clone(),
        }
    }

    /// A child context that cancels itself at `deadline` (or at the inherited
    /// deadline, whichever comes first).
    ///
    /// # Panics
    /// Must be called from within a tokio runtime.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        if self.deadline.as_ref().is_some_and(|d| d.at <= deadline) {
            return self.child();
        }

        let token = self.token.child_token();
        let stop = CancellationToken::new();
        let shared = Arc::new(Deadline {
            at: deadline,
            expired: AtomicBool::new(false),
            _timer: stop.clone().drop_guard(),
        });
        let weak = Arc::downgrade(&shared);
        let fire = token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => {
                    if let Some(shared) = weak.upgrade() {
                        shared.expired.store(true, Ordering::Release);
                        fire.cancel();
                    }
                }
                _ = fire.cancelled() => {}
                _ = stop.cancelled() => {}
            }
        });

        Self {
            token,
            deadline: Some(shared),
            info: self.info.clone(),
        }
    }

    /// Shorthand for [`Context::with_deadline`] at `now + timeout`.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Cancels this context and everything derived from it. Irreversible.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// True once cancelled (explicitly, by a parent, or by deadline).
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Completes once the context is cancelled.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }

    /// Why the context is done, or `None` while it is still live.
    pub fn err(&self) -> Option<TaskError> {
        if !self.token.is_cancelled() {
            return None;
        }
        match &self.deadline {
            Some(deadline) if deadline.expired.load(Ordering::Acquire) => {
                Some(TaskError::DeadlineExceeded)
            }
            _ => Some(TaskError::Canceled),
        }
    }

    /// The underlying cancellation token.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// The effective deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline.as_ref().map(|d| d.at)
    }

    /// Short name of the current task.
    pub fn task_name(&self) -> &str {
        self.info.as_deref().map_or(UNMANAGED, |i| &i.short_name)
    }

    /// Fully qualified path of the current task (`"main/worker"`).
    pub fn task_path(&self) -> &str {
        self.info.as_deref().map_or(UNMANAGED, |i| &i.path)
    }

    /// The nearest enclosing supervisor, if it is still alive.
    pub fn supervisor(&self) -> Option<Supervisor> {
        self.info
            .as_deref()
            .and_then(|i| i.supervisor.upgrade())
            .map(Supervisor::from_inner)
    }

    /// Handle of the current supervised task.
    pub fn task(&self) -> Option<&SupervisedTask> {
        self.info.as_deref().map(|i| &i.task)
    }

    /// Path prefix children of this context are joined onto (empty when unmanaged).
    pub(crate) fn path_prefix(&self) -> Option<&Arc<str>> {
        self.info.as_deref().map(|i| &i.path)
    }

    /// Same token and deadline with a new attachment bundle.
    pub(crate) fn attach(&self, attachments: Attachments) -> Self {
        Self {
            token: self.token.clone(),
            deadline: self.deadline.clone(),
            info: Some(Arc::new(attachments)),
        }
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("task", &self.task_path())
            .field("cancelled", &self.is_cancelled())
            .field("deadline", &self.deadline())
            .finish()
    }
}

/// Joins a task name onto its ancestor path with `/`.
pub(crate) fn join_path(prefix: Option<&Arc<str>>, name: &str) -> Arc<str> {
    match prefix {
        Some(prefix) if !prefix.is_empty() => Arc::from(format!("{prefix}/{name}")),
        _ => Arc::from(name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unmanaged_contexts_use_placeholders() {
        let ctx = Context::background();
        assert_eq!(ctx.task_name(), "[unmanaged]");
        assert_eq!(ctx.task_path(), "[unmanaged]");
        assert!(ctx.supervisor().is_none());
        assert!(ctx.task().is_none());
        assert!(ctx.err().is_none());
    }

    #[test]
    fn children_follow_parents_but_not_back() {
        let parent = Context::background();
        let a = parent.child();
        let b = parent.child();
        a.cancel();
        assert!(!parent.is_cancelled());
        assert!(!b.is_cancelled());
        parent.cancel();
        assert!(b.is_cancelled());
        assert!(matches!(b.err(), Some(TaskError::Canceled)));
    }

    #[tokio::test(start_paused = true)]
    async fn deadlines_cancel_and_report_exceeded() {
        let ctx = Context::background().with_timeout(Duration::from_millis(50));
        assert!(ctx.err().is_none());
        ctx.cancelled().await;
        assert!(matches!(ctx.err(), Some(TaskError::DeadlineExceeded)));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_before_the_deadline_stays_canceled() {
        let parent = Context::background();
        let ctx = parent.with_timeout(Duration::from_millis(50));
        parent.cancel();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(matches!(ctx.err(), Some(TaskError::Canceled)));
    }

    #[tokio::test(start_paused = true)]
    async fn inherited_deadlines_report_exceeded() {
        let ctx = Context::background().with_timeout(Duration::from_millis(50));
        let inner = ctx.with_timeout(Duration::from_secs(10)).child();
        assert_eq!(inner.deadline(), ctx.deadline());
        inner.cancelled().await;
        assert!(matches!(inner.err(), Some(TaskError::DeadlineExceeded)));
    }

    #[tokio::test]
    async fn dropped_contexts_stop_their_timers() {
        let metrics = tokio::runtime::Handle::current().metrics();
        let before = metrics.num_alive_tasks();

        let ctx = Context::background().with_timeout(Duration::from_secs(3600));
        assert_eq!(metrics.num_alive_tasks(), before + 1);
        drop(ctx);

        for _ in 0..10 {
            if metrics.num_alive_tasks() == before {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(metrics.num_alive_tasks(), before);
    }

    #[test]
    fn paths_join_with_slashes() {
        assert_eq!(&*join_path(None, "main"), "main");
        let main: Arc<str> = Arc::from("main");
        assert_eq!(&*join_path(Some(&main), "one"), "main/one");
    }
}
