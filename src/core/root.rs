//! # Tree roots and ad-hoc supervisors.
//!
//! - [`supervise_root`] runs a supervisor as the top of a tree on the caller's
//!   own task, so the caller needs no separate launch convention.
//! - [`new_supervisor`] creates a supervisor from inside a running task; it
//!   takes over that task's name and path, so its children appear directly
//!   beneath it.

use std::sync::{Arc, Weak};

use crate::core::context::{Attachments, Context, join_path};
use crate::core::supervised::SupervisedTask;
use crate::core::supervisor::Supervisor;
use crate::error::{TaskError, sift};
use crate::tasks::{BoundTask, TaskRef};

const ROOT_NAME: &str = "root";

/// Runs `sup` to completion as the root of a tree and returns its aggregate error.
///
/// If `ctx` already belongs to a supervised task, the supervisor's path is
/// joined onto that task's path.
///
/// # Panics
/// Usage errors raised while running (see [`UsageError`](crate::UsageError))
/// propagate to the caller.
pub async fn supervise_root(ctx: Context, sup: Supervisor) -> Result<(), TaskError> {
    let name: Arc<str> = Arc::from(sup.name());
    let path = join_path(ctx.path_prefix(), &name);
    let parent = ctx
        .supervisor()
        .map(|s| Arc::downgrade(s.inner()))
        .unwrap_or_else(Weak::new);

    let task: TaskRef = Arc::new(sup);
    let handle = SupervisedTask::new(
        BoundTask::bind_as(Arc::clone(&task), &name),
        Arc::clone(&name),
        parent.clone(),
    );
    handle.start(Arc::clone(&path));
    let run_ctx = ctx.attach(Attachments {
        supervisor: parent,
        task: handle.clone(),
        short_name: name,
        path: Arc::clone(&path),
    });

    let error = sift(Ok(task.run(run_ctx).await), &path);
    handle.complete(error.clone());
    match error {
        Some(err) => Err(TaskError::Child(err)),
        None => Ok(()),
    }
}

/// A supervisor that runs in place of the task owning `ctx`.
///
/// Outside any tree the supervisor is named `"root"`.
///
/// # Example
/// ```rust
/// use treesup::{Context, TaskError, TaskFn, new_supervisor};
///
/// # async fn body(ctx: Context) -> Result<(), TaskError> {
/// let sub = new_supervisor(&ctx);
/// sub.submit(TaskFn::named_arc("leaf", |ctx: Context| async move {
///     println!("running as {}", ctx.task_path());
///     Ok::<_, TaskError>(())
/// }));
/// sub.run(ctx).await
/// # }
/// ```
pub fn new_supervisor(ctx: &Context) -> Supervisor {
    let name = if ctx.task().is_some() {
        ctx.task_name()
    } else {
        ROOT_NAME
    };
    Supervisor::builder(name).inline().build()
}
