//! # Events emitted by supervisors and task workers.
//!
//! The [`EventKind`] enum classifies events across three categories:
//! - **Task lifecycle**: submitted, starting, stopped, failed, panicked
//! - **Supervisor lifecycle**: started, winding down, halted, aborted, warnings
//! - **Subscriber health**: overflow, panic
//!
//! The [`Event`] struct carries metadata such as the supervisor and task paths
//! and a human-readable reason.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically. Use `seq` to restore the exact order when subscribers process
//! events at different speeds.
//!
//! ## Example
//! ```rust
//! use treesup::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::TaskFailed)
//!     .with_supervisor("main")
//!     .with_task("main/worker")
//!     .with_reason("boom");
//!
//! assert_eq!(ev.kind, EventKind::TaskFailed);
//! assert_eq!(ev.task.as_deref(), Some("main/worker"));
//! assert_eq!(ev.reason.as_deref(), Some("boom"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of supervision events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets `task` (subscriber name) and `reason` (panic message).
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets `task` (subscriber name) and `reason`.
    SubscriberOverflow,

    // === Supervisor lifecycle ===
    /// Supervisor's `run` began.
    ///
    /// Sets `supervisor`.
    SupervisorStarted,

    /// Cancellation was fanned out; the supervisor is waiting for children.
    ///
    /// Sets `supervisor` and `reason` (the error that triggered it).
    WindingDown,

    /// Every child reported; `run` is returning.
    ///
    /// Sets `supervisor` and, if it failed, `reason`.
    Halted,

    /// Rapid abort: `run` returned without waiting for children.
    ///
    /// Sets `supervisor` and `reason`.
    Aborted,

    /// Children still running long after cancellation.
    ///
    /// Sets `supervisor` and `reason` (the waiting names).
    StragglersWarning,

    // === Task lifecycle ===
    /// Task registered with a supervisor (may still be gated).
    ///
    /// Sets `supervisor` and `task` (resolved name).
    TaskSubmitted,

    /// Task registered after wind-down began; it runs pre-cancelled.
    ///
    /// Sets `supervisor` and `task`.
    LameTaskSubmitted,

    /// Task worker launched.
    ///
    /// Sets `supervisor` and `task` (full path).
    TaskStarting,

    /// Task returned `Ok(())`.
    ///
    /// Sets `supervisor` and `task`.
    TaskStopped,

    /// Task returned an error.
    ///
    /// Sets `supervisor`, `task` and `reason`.
    TaskFailed,

    /// Task panicked; the panic was converted into an error.
    ///
    /// Sets `supervisor`, `task` and `reason`.
    TaskPanicked,
}

/// Supervision event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Path of the supervisor the event concerns, if applicable.
    pub supervisor: Option<Arc<str>>,
    /// Name or path of the task, if applicable.
    pub task: Option<Arc<str>>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            supervisor: None,
            task: None,
            reason: None,
        }
    }

    /// Attaches a supervisor path.
    #[inline]
    pub fn with_supervisor(mut self, supervisor: impl Into<Arc<str>>) -> Self {
        self.supervisor = Some(supervisor.into());
        self
    }

    /// Attaches a task name.
    #[inline]
    pub fn with_task(mut self, task: impl Into<Arc<str>>) -> Self {
        self.task = Some(task.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_task(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_task(subscriber)
            .with_reason(info)
    }

    /// True for events describing a failed or panicked task.
    #[inline]
    pub fn is_task_failure(&self) -> bool {
        matches!(self.kind, EventKind::TaskFailed | EventKind::TaskPanicked)
    }
}
