//! # Function-backed task (`TaskFn`)
//!
//! [`TaskFn`] wraps a closure `F: Fn(Context) -> Fut`, producing a fresh
//! future per run. No state is shared between runs unless the closure captures
//! it explicitly (e.g. through an `Arc`).
//!
//! ## Example
//! ```rust
//! use treesup::{Context, Task, TaskError, TaskFn, TaskRef};
//!
//! let t: TaskRef = TaskFn::named_arc("worker", |ctx: Context| async move {
//!     if ctx.is_cancelled() {
//!         return Err(TaskError::Canceled);
//!     }
//!     // do work...
//!     Ok::<_, TaskError>(())
//! });
//!
//! assert_eq!(t.name(), Some("worker"));
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::core::Context;
use crate::error::TaskError;
use crate::tasks::task::Task;

/// Function-backed task implementation.
pub struct TaskFn<F> {
    name: Option<Cow<'static, str>>,
    f: F,
}

impl<F> TaskFn<F> {
    /// Creates an unnamed function-backed task.
    pub fn new(f: F) -> Self {
        Self { name: None, f }
    }

    /// Creates a function-backed task declaring its own name.
    pub fn named(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: Some(name.into()),
            f,
        }
    }

    /// Creates an unnamed task and returns it as a shared handle.
    pub fn arc(f: F) -> Arc<Self> {
        Arc::new(Self::new(f))
    }

    /// Creates a named task and returns it as a shared handle.
    pub fn named_arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::named(name, f))
    }
}

impl<F> std::fmt::Debug for TaskFn<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskFn").field("name", &self.name).finish()
    }
}

#[async_trait]
impl<F, Fut> Task for TaskFn<F>
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
{
    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    async fn run(&self, ctx: Context) -> Result<(), TaskError> {
        (self.f)(ctx).await
    }
}
