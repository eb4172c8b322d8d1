//! # Supervisor reactions to child errors and warnings.
//!
//! - [`ErrorReactor`] decides how a supervisor responds to a failed child:
//!   escalate ([`Reaction::Error`]), ignore, or abort rapidly.
//! - [`WarningHandler`] receives [`SupervisionWarning`]s (stragglers that ignore
//!   cancellation, lame submissions); returning `Err` upgrades the warning into
//!   a rapid abort.

use std::sync::Arc;
use std::time::Duration;

use crate::error::{ErrChild, TaskError};

/// What a supervisor does about a child's error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Reaction {
    /// Wind down: cancel siblings, wait for them, and return this error
    /// (unless an earlier one was already recorded).
    #[default]
    Error,
    /// Keep running as if the child had succeeded. The error stays on the
    /// child's own handle.
    Ignore,
    /// Cancel siblings and return immediately without waiting for them.
    ///
    /// Children that ignore cancellation are abandoned (they keep running
    /// unsupervised). Use only when the program is on its way out.
    AbortRapidly,
}

type ReactFn = dyn Fn(&ErrChild) -> Reaction + Send + Sync;

/// Pluggable policy mapping a child error to a [`Reaction`].
#[derive(Clone)]
pub struct ErrorReactor(Arc<ReactFn>);

impl ErrorReactor {
    /// Wraps a custom policy.
    ///
    /// # Example
    /// ```
    /// use treesup::{ErrorReactor, Reaction};
    ///
    /// // Tolerate cancellations, escalate everything else.
    /// let reactor = ErrorReactor::new(|err| {
    ///     if err.error().is_cancellation() { Reaction::Ignore } else { Reaction::Error }
    /// });
    /// ```
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&ErrChild) -> Reaction + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Always answers `reaction`.
    pub fn always(reaction: Reaction) -> Self {
        Self::new(move |_| reaction)
    }

    /// Applies the policy.
    pub fn react(&self, err: &ErrChild) -> Reaction {
        (self.0)(err)
    }
}

impl Default for ErrorReactor {
    fn default() -> Self {
        Self::always(Reaction::Error)
    }
}

impl std::fmt::Debug for ErrorReactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ErrorReactor(..)")
    }
}

/// Situations that almost certainly indicate a programming error.
#[non_exhaustive]
#[derive(Debug, Clone)]
pub enum SupervisionWarning {
    /// Children still running long after cancellation was fanned out.
    Stragglers {
        /// Supervisor path.
        supervisor: Arc<str>,
        /// Names of children that have not reported yet.
        waiting: Vec<Arc<str>>,
        /// Time elapsed since cancellation.
        waited: Duration,
    },
    /// A task was submitted after the supervisor began winding down; it runs
    /// with an already-cancelled context.
    LameSubmission {
        /// Supervisor path.
        supervisor: Arc<str>,
        /// Resolved name of the lame task.
        task: Arc<str>,
    },
}

type WarnFn = dyn Fn(&SupervisionWarning) -> Result<(), TaskError> + Send + Sync;

/// Receives warnings; an `Err` makes the supervisor abort rapidly with it.
#[derive(Clone)]
pub struct WarningHandler(Arc<WarnFn>);

impl WarningHandler {
    /// Wraps a custom handler.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&SupervisionWarning) -> Result<(), TaskError> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Applies the handler.
    pub fn handle(&self, warning: &SupervisionWarning) -> Result<(), TaskError> {
        (self.0)(warning)
    }
}

impl Default for WarningHandler {
    /// Logs the warning at `WARN` level and lets the supervisor continue.
    fn default() -> Self {
        Self::new(|warning| {
            match warning {
                SupervisionWarning::Stragglers {
                    supervisor,
                    waiting,
                    waited,
                } => tracing::warn!(
                    supervisor = %supervisor,
                    waiting = ?waiting,
                    waited = ?waited,
                    "children still running after cancellation"
                ),
                SupervisionWarning::LameSubmission { supervisor, task } => tracing::warn!(
                    supervisor = %supervisor,
                    task = %task,
                    "task submitted while winding down; running it with a cancelled context"
                ),
            }
            Ok(())
        })
    }
}

impl std::fmt::Debug for WarningHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("WarningHandler(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_reactor_escalates() {
        let err = ErrChild::new(TaskError::fail("x"), false, "a");
        assert_eq!(ErrorReactor::default().react(&err), Reaction::Error);
    }

    #[test]
    fn default_warning_handler_continues() {
        let warning = SupervisionWarning::LameSubmission {
            supervisor: Arc::from("main"),
            task: Arc::from("late"),
        };
        assert!(WarningHandler::default().handle(&warning).is_ok());
    }
}
