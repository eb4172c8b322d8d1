//! # LogWriter: structured event logging
//!
//! A subscriber that turns every [`Event`] into a `tracing` record, at a level
//! matching its severity. Install any `tracing` subscriber (for instance
//! `tracing_subscriber::fmt`) to see the output.
//!
//! ## Example output (fmt layer)
//! ```text
//! INFO  treesup: supervisor started supervisor="main"
//! DEBUG treesup: task starting supervisor="main" task="main/worker"
//! WARN  treesup: task failed supervisor="main" task="main/worker" reason="error: connection refused"
//! INFO  treesup: winding down supervisor="main" reason="error: connection refused"
//! INFO  treesup: halted supervisor="main" reason="error: connection refused"
//! ```

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let supervisor = e.supervisor.as_deref().unwrap_or("-");
        let task = e.task.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("");

        match e.kind {
            EventKind::SupervisorStarted => info!(seq = e.seq, supervisor, "supervisor started"),
            EventKind::TaskSubmitted => debug!(seq = e.seq, supervisor, task, "task submitted"),
            EventKind::LameTaskSubmitted => {
                warn!(seq = e.seq, supervisor, task, "lame task submitted")
            }
            EventKind::TaskStarting => debug!(seq = e.seq, supervisor, task, "task starting"),
            EventKind::TaskStopped => debug!(seq = e.seq, supervisor, task, "task stopped"),
            EventKind::TaskFailed => warn!(seq = e.seq, supervisor, task, reason, "task failed"),
            EventKind::TaskPanicked => {
                error!(seq = e.seq, supervisor, task, reason, "task panicked")
            }
            EventKind::WindingDown => info!(seq = e.seq, supervisor, reason, "winding down"),
            EventKind::StragglersWarning => {
                warn!(seq = e.seq, supervisor, waiting = reason, "children ignoring cancellation")
            }
            EventKind::Halted => info!(seq = e.seq, supervisor, reason, "halted"),
            EventKind::Aborted => error!(seq = e.seq, supervisor, reason, "aborted"),
            EventKind::SubscriberOverflow => {
                warn!(seq = e.seq, subscriber = task, reason, "subscriber overflow")
            }
            EventKind::SubscriberPanicked => {
                error!(seq = e.seq, subscriber = task, reason, "subscriber panicked")
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
