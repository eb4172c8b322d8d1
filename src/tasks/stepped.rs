//! # Stepped tasks.
//!
//! A [`SteppedTask`] supplies one step; [`Stepped`] repeats it until the
//! context is cancelled or a step fails. On cancellation the context's own
//! error ([`TaskError::Canceled`] or [`TaskError::DeadlineExceeded`]) is returned.

use async_trait::async_trait;

use crate::core::Context;
use crate::error::TaskError;
use crate::tasks::task::Task;

/// A unit of work meant to be repeated until cancelled.
#[async_trait]
pub trait SteppedTask: Send + Sync + 'static {
    /// Declared display name, if any.
    fn name(&self) -> Option<&str> {
        None
    }

    /// Runs one step. An error stops the loop and becomes the task's result.
    async fn run_step(&self, ctx: &Context) -> Result<(), TaskError>;
}

/// Adapter turning a [`SteppedTask`] into a [`Task`].
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use treesup::{Context, Stepped, SteppedTask, TaskError, TaskRef};
///
/// struct Tick;
///
/// #[async_trait]
/// impl SteppedTask for Tick {
///     async fn run_step(&self, ctx: &Context) -> Result<(), TaskError> {
///         ctx.cancelled().await;
///         Ok(())
///     }
/// }
///
/// let task: TaskRef = Stepped::arc(Tick);
/// ```
#[derive(Debug)]
pub struct Stepped<T>(T);

impl<T: SteppedTask> Stepped<T> {
    /// Wraps a stepped task.
    pub fn new(inner: T) -> Self {
        Self(inner)
    }

    /// Wraps a stepped task and returns it as a shared handle.
    pub fn arc(inner: T) -> std::sync::Arc<Self> {
        std::sync::Arc::new(Self(inner))
    }

    /// The wrapped stepped task.
    pub fn inner(&self) -> &T {
        &self.0
    }
}

#[async_trait]
impl<T: SteppedTask> Task for Stepped<T> {
    fn name(&self) -> Option<&str> {
        self.0.name()
    }

    async fn run(&self, ctx: Context) -> Result<(), TaskError> {
        loop {
            if let Some(err) = ctx.err() {
                return Err(err);
            }
            self.0.run_step(&ctx).await?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counter {
        steps: Arc<AtomicUsize>,
        fail_at: usize,
    }

    #[async_trait]
    impl SteppedTask for Counter {
        async fn run_step(&self, _ctx: &Context) -> Result<(), TaskError> {
            let n = self.steps.fetch_add(1, Ordering::SeqCst) + 1;
            if n == self.fail_at {
                return Err(TaskError::fail("step failed"));
            }
            tokio::task::yield_now().await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn stops_on_first_step_error() {
        let steps = Arc::new(AtomicUsize::new(0));
        let task = Stepped::new(Counter {
            steps: steps.clone(),
            fail_at: 3,
        });
        let err = task.run(Context::background()).await.unwrap_err();
        assert_eq!(err.to_string(), "step failed");
        assert_eq!(steps.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn returns_context_error_when_cancelled() {
        let steps = Arc::new(AtomicUsize::new(0));
        let task = Stepped::new(Counter {
            steps: steps.clone(),
            fail_at: usize::MAX,
        });
        let ctx = Context::background();
        ctx.cancel();
        let err = task.run(ctx).await.unwrap_err();
        assert!(matches!(err, TaskError::Canceled));
        assert_eq!(steps.load(Ordering::SeqCst), 0);
    }
}
