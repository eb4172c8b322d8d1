//! # Supervisor: owns a group of concurrently running children.
//!
//! A [`Supervisor`] launches one worker per submitted task, watches a single
//! completion-report channel, applies its [`ErrorReactor`] to child errors and
//! fans cancellation out to every child before returning the first error.
//! A supervisor is itself a [`Task`], so trees compose uniformly.
//!
//! ## Phases
//! ```text
//! NotStarted ──run()──► Running ──error / parent cancel──► WindingDown ──all reported──► Halted
//!     │                    │  └───────────── no children left (return-on-empty) ─────────► Halted
//!     │                    └──── AbortRapidly / quit_aggressively ──────────────────────► Aborted
//!     └── submit(): task registered, gated until run()
//! ```
//!
//! ## Ownership
//! - Before `run`, submissions are registered under the supervisor mutex and kept
//!   gated.
//! - After `run` starts, submissions travel over a control channel to the
//!   control loop, which is the only writer of the live-task map and the phase.
//! - Children hold a non-owning back-reference; the supervisor's live map is the
//!   only owner.
//!
//! ## Example
//! ```rust
//! use treesup::{Context, Supervisor, TaskError, TaskFn};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let sup = Supervisor::new("main");
//!     let handle = sup.submit(TaskFn::named_arc("one", |ctx: Context| async move {
//!         assert_eq!(ctx.task_path(), "main/one");
//!         Ok::<_, TaskError>(())
//!     }));
//!
//!     sup.run(Context::background()).await.unwrap();
//!     assert!(handle.promise().value().unwrap().is_ok());
//! }
//! ```

use std::collections::HashSet;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, Weak};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::core::builder::SupervisorBuilder;
use crate::core::config::SupervisorConfig;
use crate::core::context::{Context, join_path};
use crate::core::control::{Control, ControlLoop};
use crate::core::naming::{MAX_NAME_ATTEMPTS, NameStrategy};
use crate::core::publisher::{Listener, Publisher};
use crate::core::reaction::{ErrorReactor, SupervisionWarning, WarningHandler};
use crate::core::supervised::SupervisedTask;
use crate::core::worker::Worker;
use crate::error::{ErrChild, TaskError, UsageError};
use crate::events::{Event, EventKind};
use crate::tasks::{BoundTask, Task, TaskGen, TaskRef};

/// Lifecycle phase of a supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Phase {
    /// Accepting submissions; nothing runs yet.
    NotStarted = 0,
    /// Launching and watching children.
    Running = 1,
    /// Cancellation fanned out; waiting for the remaining children.
    WindingDown = 2,
    /// Every launched child reported. Terminal.
    Halted = 3,
    /// Returned without waiting for children. Terminal.
    Aborted = 4,
}

impl Phase {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Phase::NotStarted,
            1 => Phase::Running,
            2 => Phase::WindingDown,
            3 => Phase::Halted,
            _ => Phase::Aborted,
        }
    }

    /// True for [`Phase::Halted`] and [`Phase::Aborted`].
    pub fn is_terminal(self) -> bool {
        self >= Phase::Halted
    }
}

/// Receivers handed to the control loop when `run` starts.
struct Pending {
    control: mpsc::UnboundedReceiver<Control>,
    source: Option<TaskGen>,
}

struct Registry {
    started: bool,
    names: HashSet<Arc<str>>,
    early: Vec<SupervisedTask>,
    pending: Option<Pending>,
}

pub(crate) struct SupervisorInner {
    name: Arc<str>,
    /// Runs in place of the task that created it (path = that task's path).
    inline: bool,
    cfg: Mutex<SupervisorConfig>,
    phase: AtomicU8,
    registry: Mutex<Registry>,
    control: mpsc::UnboundedSender<Control>,
    quit: CancellationToken,
    path: OnceLock<Arc<str>>,
    parent: OnceLock<Weak<SupervisorInner>>,
    events: OnceLock<Publisher>,
    children: OnceLock<CancellationToken>,
    first_error: Mutex<Option<ErrChild>>,
}

impl SupervisorInner {
    pub(crate) fn phase(&self) -> Phase {
        Phase::from_u8(self.phase.load(Ordering::Acquire))
    }

    pub(crate) fn set_phase(&self, phase: Phase) {
        self.phase.store(phase as u8, Ordering::Release);
    }

    pub(crate) fn quit(&self) -> &CancellationToken {
        &self.quit
    }

    pub(crate) fn config(&self) -> MutexGuard<'_, SupervisorConfig> {
        lock(&self.cfg)
    }

    /// Frees a resolved name once its task is no longer live.
    pub(crate) fn release_name(&self, task: &SupervisedTask) {
        lock(&self.registry).names.remove(task.name_arc());
    }

    pub(crate) fn record_first_error(&self, err: &ErrChild) {
        lock(&self.first_error).get_or_insert_with(|| err.clone());
    }

    /// Runs the warning handler outside any lock.
    pub(crate) fn warn(&self, warning: &SupervisionWarning) -> Result<(), TaskError> {
        let handler = self.config().warning_handler.clone();
        handler.handle(warning)
    }
}

/// Handle to a supervisor. Cheap to clone; all clones control the same group.
#[derive(Clone)]
pub struct Supervisor {
    inner: Arc<SupervisorInner>,
}

impl Supervisor {
    /// A supervisor with default configuration.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self::builder(name).build()
    }

    /// Starts building a supervisor.
    pub fn builder(name: impl Into<Arc<str>>) -> SupervisorBuilder {
        SupervisorBuilder::new(name)
    }

    pub(crate) fn from_parts(
        name: Arc<str>,
        cfg: SupervisorConfig,
        source: Option<TaskGen>,
        inline: bool,
    ) -> Self {
        let (control, rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(SupervisorInner {
                name,
                inline,
                cfg: Mutex::new(cfg),
                phase: AtomicU8::new(Phase::NotStarted as u8),
                registry: Mutex::new(Registry {
                    started: false,
                    names: HashSet::new(),
                    early: Vec::new(),
                    pending: Some(Pending {
                        control: rx,
                        source,
                    }),
                }),
                control,
                quit: CancellationToken::new(),
                path: OnceLock::new(),
                parent: OnceLock::new(),
                events: OnceLock::new(),
                children: OnceLock::new(),
                first_error: Mutex::new(None),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<SupervisorInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn inner(&self) -> &Arc<SupervisorInner> {
        &self.inner
    }

    /// Short name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Fully qualified path, known once `run` has started.
    pub fn path(&self) -> Option<&str> {
        self.inner.path.get().map(|p| &**p)
    }

    /// Current phase; readable without blocking.
    pub fn phase(&self) -> Phase {
        self.inner.phase()
    }

    /// The supervisor this one runs under, if any (known once `run` has started).
    pub fn parent(&self) -> Option<Supervisor> {
        self.inner
            .parent
            .get()
            .and_then(Weak::upgrade)
            .map(Supervisor::from_inner)
    }

    /// The error that decided (or will decide) this supervisor's result.
    pub fn first_error(&self) -> Option<ErrChild> {
        lock(&self.inner.first_error).clone()
    }

    /// Names of registered tasks that have not reported yet, sorted.
    pub fn tasks(&self) -> Vec<String> {
        let reg = lock(&self.inner.registry);
        let mut names: Vec<String> = reg.names.iter().map(|n| n.to_string()).collect();
        names.sort_unstable();
        names
    }

    /// Registers a task under its declared (or generated) name. Never blocks.
    ///
    /// Before `run` the task stays gated; while running it is launched at once.
    /// After wind-down began the task is *lame*: it runs with a cancelled context.
    ///
    /// # Panics
    /// Panics with [`UsageError::NameExhausted`] if the name strategy never
    /// proposes a free name.
    pub fn submit(&self, task: TaskRef) -> SupervisedTask {
        self.admit(BoundTask::bind(task))
    }

    /// Like [`Supervisor::submit`], but requests `name` instead of the task's own.
    pub fn submit_as(&self, name: &str, task: TaskRef) -> SupervisedTask {
        self.admit(BoundTask::bind_as(task, name))
    }

    fn admit(&self, bound: BoundTask) -> SupervisedTask {
        let task = {
            let mut reg = lock(&self.inner.registry);
            let task = self.register(&mut reg, bound);
            if !reg.started {
                reg.early.push(task.clone());
                return task;
            }
            task
        };

        if self.phase() >= Phase::WindingDown {
            task.mark_lame();
        }
        if let Some(events) = self.inner.events.get() {
            let kind = if task.is_lame() {
                EventKind::LameTaskSubmitted
            } else {
                EventKind::TaskSubmitted
            };
            events.emit(|| Event::new(kind).with_task(Arc::clone(task.name_arc())));
        }
        if self.inner.control.send(Control::Admit(task.clone())).is_err() {
            self.launch_detached(task.clone());
        }
        task
    }

    /// Resolves a free name and creates the handle. Caller holds the registry lock.
    fn register(&self, reg: &mut Registry, bound: BoundTask) -> SupervisedTask {
        let strategy = self.inner.config().name_strategy.clone();
        let requested = bound.name();
        let Some(name) = strategy.select(requested, |n| reg.names.contains(n)) else {
            panic!(
                "{}",
                UsageError::NameExhausted {
                    requested: requested.to_string(),
                    attempts: MAX_NAME_ATTEMPTS,
                }
            );
        };
        let name: Arc<str> = Arc::from(name);
        reg.names.insert(Arc::clone(&name));
        SupervisedTask::new(bound, name, Arc::downgrade(&self.inner))
    }

    /// Binds and registers a task pulled from the stream source.
    pub(crate) fn register_generated(&self, task: TaskRef) -> SupervisedTask {
        let mut reg = lock(&self.inner.registry);
        self.register(&mut reg, BoundTask::bind(task))
    }

    /// Launches a lame task once no control loop is listening.
    fn launch_detached(&self, task: SupervisedTask) {
        task.mark_lame();
        let token = self.inner.children.get().cloned().unwrap_or_default();
        token.cancel();
        let events = self
            .inner
            .events
            .get()
            .cloned()
            .unwrap_or_else(|| Publisher::new(None, Arc::clone(&self.inner.name)));
        let warning = SupervisionWarning::LameSubmission {
            supervisor: Arc::clone(events.supervisor()),
            task: Arc::clone(task.name_arc()),
        };
        if let Err(err) = self.inner.warn(&warning) {
            tracing::debug!(
                supervisor = %events.supervisor(),
                error = %err,
                "warning escalation ignored: supervisor already returned"
            );
        }
        Worker {
            task,
            ctx: Context::from_token(token),
            supervisor: Arc::downgrade(&self.inner),
            events,
            reports: None,
        }
        .spawn();
    }

    /// Enables or disables returning once no children remain.
    ///
    /// Disabling it turns the supervisor into a pool that waits for further
    /// submissions until re-enabled, cancelled or told to quit.
    ///
    /// # Panics
    /// Panics with [`UsageError::ReturnOnEmptyAfterRunning`] once the
    /// supervisor has left its running phase.
    pub fn set_return_on_empty(&self, value: bool) {
        if self.phase() > Phase::Running {
            panic!(
                "{}",
                UsageError::ReturnOnEmptyAfterRunning {
                    supervisor: self.name().to_string(),
                }
            );
        }
        self.inner.config().return_on_empty = value;
        let _ = self.inner.control.send(Control::Poke);
    }

    /// Replaces the name-collision policy.
    pub fn set_name_strategy(&self, strategy: NameStrategy) {
        self.inner.config().name_strategy = strategy;
    }

    /// Replaces the child-error policy.
    pub fn set_error_reactor(&self, reactor: ErrorReactor) {
        self.inner.config().error_reactor = reactor;
    }

    /// Replaces the warning handler.
    pub fn set_warning_handler(&self, handler: WarningHandler) {
        self.inner.config().warning_handler = handler;
    }

    /// Cancels every child and makes `run` return without waiting for them.
    ///
    /// `run` then returns the first recorded error, or [`TaskError::Aborted`].
    pub fn quit_aggressively(&self) {
        self.inner.quit.cancel();
    }

    /// Runs the supervision loop until every child reported (or an abort).
    ///
    /// Returns the first escalated child error wrapped in [`TaskError::Child`].
    ///
    /// # Panics
    /// Panics with [`UsageError::RunTwice`] on a second invocation.
    pub async fn run(&self, ctx: Context) -> Result<(), TaskError> {
        if self
            .inner
            .phase
            .compare_exchange(
                Phase::NotStarted as u8,
                Phase::Running as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            self.run_twice();
        }

        let path = self.resolve_path(&ctx);
        let _ = self.inner.path.set(Arc::clone(&path));
        if let Some(parent) = ctx.supervisor() {
            let _ = self.inner.parent.set(Arc::downgrade(parent.inner()));
        }

        let subscribers = self.inner.config().subscribers.clone();
        let (bus, listener) = if subscribers.is_empty() {
            let inherited = ctx
                .supervisor()
                .and_then(|p| p.inner.events.get().and_then(|e| e.bus().cloned()));
            (inherited, None)
        } else {
            let (bus, listener) = Listener::spawn(subscribers);
            (Some(bus), Some(listener))
        };
        let events = Publisher::new(bus, Arc::clone(&path));
        let _ = self.inner.events.set(events.clone());

        let group = ctx.child();
        let _ = self.inner.children.set(group.token().clone());
        events.emit(|| Event::new(EventKind::SupervisorStarted));
        tracing::debug!(supervisor = %path, "supervisor running");

        let (early, pending) = {
            let mut reg = lock(&self.inner.registry);
            reg.started = true;
            (std::mem::take(&mut reg.early), reg.pending.take())
        };
        let Some(pending) = pending else {
            self.run_twice();
        };

        let mut control = ControlLoop::new(
            self.clone(),
            ctx,
            group,
            events.clone(),
            pending.control,
            pending.source,
        );
        for task in early {
            events.emit(|| Event::new(EventKind::TaskSubmitted).with_task(Arc::clone(task.name_arc())));
            control.launch(task);
        }
        let result = control.supervise().await;

        if let Some(listener) = listener {
            listener.shutdown().await;
        }
        result
    }

    fn run_twice(&self) -> ! {
        panic!(
            "{}",
            UsageError::RunTwice {
                supervisor: self.name().to_string(),
            }
        )
    }

    /// Path of this supervisor: the launching task's path when it runs as that
    /// task, otherwise its name joined onto the enclosing task's path.
    fn resolve_path(&self, ctx: &Context) -> Arc<str> {
        let Some(current) = ctx.task() else {
            return join_path(None, self.name());
        };
        let launched_as_self = current
            .task()
            .as_supervisor()
            .is_some_and(|s| Arc::ptr_eq(&s.inner, &self.inner));
        if launched_as_self || self.inner.inline {
            Arc::from(ctx.task_path())
        } else {
            join_path(ctx.path_prefix(), self.name())
        }
    }
}

#[async_trait]
impl Task for Supervisor {
    fn name(&self) -> Option<&str> {
        Some(&self.inner.name)
    }

    async fn run(&self, ctx: Context) -> Result<(), TaskError> {
        Supervisor::run(self, ctx).await
    }

    fn as_supervisor(&self) -> Option<&Supervisor> {
        Some(self)
    }
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("name", &self.name())
            .field("path", &self.path())
            .field("phase", &self.phase())
            .finish()
    }
}

pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
