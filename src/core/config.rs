//! # Supervisor configuration.
//!
//! Provides [`SupervisorConfig`], the settings a supervisor is built with.
//! Every default is an explicit value injected at construction; there is no
//! shared mutable package state.
//!
//! Config is used in two ways:
//! 1. **Construction**: `Supervisor::builder(name).with_config(cfg)`
//! 2. **Reconfiguration**: the `set_*` methods on [`Supervisor`](crate::Supervisor)
//!    replace individual fields under the supervisor's lock.
//!
//! ## Sentinel values
//! - `straggler_warning = None` → never warn about slow children.

use std::sync::Arc;
use std::time::Duration;

use crate::core::naming::NameStrategy;
use crate::core::reaction::{ErrorReactor, WarningHandler};
use crate::subscribers::Subscribe;

/// Configuration for one supervisor.
///
/// ## Field semantics
/// - `return_on_empty`: return from `run` as soon as no children remain (`false` = pool)
/// - `name_strategy`: collision policy for child names
/// - `error_reactor`: response to a failed child
/// - `warning_handler`: response to [`SupervisionWarning`](crate::SupervisionWarning)s
/// - `straggler_warning`: period after cancellation before slow children are reported
/// - `subscribers`: event subscribers; nested supervisors without their own
///   subscribers publish to their parent's
#[derive(Clone)]
pub struct SupervisorConfig {
    /// Return from `run` once every child has reported.
    ///
    /// Setting this to `false` turns the supervisor into a pool that keeps
    /// accepting submissions. It then only returns after being switched back
    /// to `true`, cancelled through its run context, or told to quit.
    pub return_on_empty: bool,

    /// Policy used to resolve child name collisions.
    pub name_strategy: NameStrategy,

    /// Policy deciding how a child error is handled.
    pub error_reactor: ErrorReactor,

    /// Handler for supervision warnings.
    pub warning_handler: WarningHandler,

    /// How long to wait after cancellation before reporting stragglers
    /// (repeated every period while they remain).
    pub straggler_warning: Option<Duration>,

    /// Event subscribers attached to this supervisor.
    pub subscribers: Vec<Arc<dyn Subscribe>>,
}

impl SupervisorConfig {
    /// Returns the straggler period, ignoring a zero duration.
    #[inline]
    pub fn straggler_period(&self) -> Option<Duration> {
        self.straggler_warning.filter(|d| *d > Duration::ZERO)
    }
}

impl Default for SupervisorConfig {
    /// Default configuration:
    ///
    /// - `return_on_empty = true`
    /// - `name_strategy = NameStrategy::suffix()`
    /// - `error_reactor`: every error escalates
    /// - `warning_handler`: log via `tracing` and continue
    /// - `straggler_warning = 2s`
    /// - no subscribers
    fn default() -> Self {
        Self {
            return_on_empty: true,
            name_strategy: NameStrategy::default(),
            error_reactor: ErrorReactor::default(),
            warning_handler: WarningHandler::default(),
            straggler_warning: Some(Duration::from_secs(2)),
            subscribers: Vec::new(),
        }
    }
}

impl std::fmt::Debug for SupervisorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupervisorConfig")
            .field("return_on_empty", &self.return_on_empty)
            .field("straggler_warning", &self.straggler_warning)
            .field("subscribers", &self.subscribers.len())
            .finish_non_exhaustive()
    }
}
