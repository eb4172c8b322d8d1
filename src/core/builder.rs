use std::sync::Arc;
use std::time::Duration;

use crate::core::config::SupervisorConfig;
use crate::core::naming::NameStrategy;
use crate::core::reaction::{ErrorReactor, WarningHandler};
use crate::core::supervisor::Supervisor;
use crate::subscribers::Subscribe;
use crate::tasks::{TaskGen, TaskRef};

/// Builder for constructing a [`Supervisor`] with optional features.
pub struct SupervisorBuilder {
    name: Arc<str>,
    cfg: SupervisorConfig,
    tasks: Vec<TaskRef>,
    source: Option<TaskGen>,
    inline: bool,
}

impl SupervisorBuilder {
    /// Creates a new builder with the default configuration.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            cfg: SupervisorConfig::default(),
            tasks: Vec::new(),
            source: None,
            inline: false,
        }
    }

    /// Replaces the whole configuration.
    pub fn with_config(mut self, cfg: SupervisorConfig) -> Self {
        self.cfg = cfg;
        self
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive events of this supervisor and of every nested
    /// supervisor that has none of its own, through dedicated workers with
    /// bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.cfg.subscribers = subscribers;
        self
    }

    /// Whether `run` returns once no children remain (default `true`).
    pub fn return_on_empty(mut self, value: bool) -> Self {
        self.cfg.return_on_empty = value;
        self
    }

    pub fn name_strategy(mut self, strategy: NameStrategy) -> Self {
        self.cfg.name_strategy = strategy;
        self
    }

    pub fn error_reactor(mut self, reactor: ErrorReactor) -> Self {
        self.cfg.error_reactor = reactor;
        self
    }

    pub fn warning_handler(mut self, handler: WarningHandler) -> Self {
        self.cfg.warning_handler = handler;
        self
    }

    /// Straggler warning period; `None` disables the warning.
    pub fn straggler_warning(mut self, period: Option<Duration>) -> Self {
        self.cfg.straggler_warning = period;
        self
    }

    /// Tasks submitted at build time (gated until `run`).
    pub fn with_tasks(mut self, tasks: Vec<TaskRef>) -> Self {
        self.tasks.extend(tasks);
        self
    }

    /// Source the supervisor admits tasks from while running.
    pub fn with_source(mut self, source: TaskGen) -> Self {
        self.source = Some(source);
        self
    }

    /// Runs in place of the task whose context creates it.
    pub(crate) fn inline(mut self) -> Self {
        self.inline = true;
        self
    }

    /// Builds the supervisor and submits the configured tasks.
    pub fn build(self) -> Supervisor {
        let sup = Supervisor::from_parts(self.name, self.cfg, self.source, self.inline);
        for task in self.tasks {
            sup.submit(task);
        }
        sup
    }
}
