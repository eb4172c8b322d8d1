//! # Task abstraction.
//!
//! A [`Task`] runs to completion given a cancellable [`Context`], producing an
//! error or nothing. The common handle type is [`TaskRef`], an `Arc<dyn Task>`
//! suitable for handing to supervisors.
//!
//! Three capability variants share this one trait:
//! - plain tasks (no declared name; the supervisor generates one),
//! - named tasks ([`Task::name`] returns `Some`),
//! - stepped tasks, adapted through [`Stepped`](crate::Stepped).

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::{Context, Supervisor};
use crate::error::TaskError;

/// # Asynchronous, cancelable unit of work.
///
/// Implementors should regularly check [`Context::is_cancelled`] (or await
/// [`Context::cancelled`]) and exit promptly once cancelled. The library cannot
/// force this; it is a cooperative contract.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use treesup::{Context, Task, TaskError};
///
/// struct Demo;
///
/// #[async_trait]
/// impl Task for Demo {
///     fn name(&self) -> Option<&str> { Some("demo") }
///
///     async fn run(&self, ctx: Context) -> Result<(), TaskError> {
///         if let Some(err) = ctx.err() {
///             return Err(err);
///         }
///         // do work...
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Task: Send + Sync + 'static {
    /// Declared display name, if any.
    ///
    /// Tasks returning `None` get a generated name when submitted.
    fn name(&self) -> Option<&str> {
        None
    }

    /// Executes the task until completion or cancellation.
    async fn run(&self, ctx: Context) -> Result<(), TaskError>;

    #[doc(hidden)]
    fn as_supervisor(&self) -> Option<&Supervisor> {
        None
    }
}

/// Shared handle to a task.
pub type TaskRef = Arc<dyn Task>;
