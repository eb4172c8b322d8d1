//! # Child launch.
//!
//! One [`Worker`] per launched task: it derives the task's context, runs the
//! task with panic recovery, classifies the outcome and reports it.
//!
//! ```text
//! spawn ─► attach {supervisor, task, name, path} ─► publish TaskStarting
//!       ─► task.run(ctx) (catch_unwind) ─► sift ─► publish Stopped/Failed/Panicked
//!       ─► complete handle (error slot + promise) ─► send Report
//! ```
//!
//! Classification happens strictly before the report is sent, so the control
//! loop never sees a raw panic.

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Weak};

use futures::FutureExt;
use tokio::sync::mpsc;

use crate::core::context::{Attachments, Context, join_path};
use crate::core::publisher::Publisher;
use crate::core::supervised::SupervisedTask;
use crate::core::supervisor::SupervisorInner;
use crate::error::{ErrChild, sift};
use crate::events::{Event, EventKind};

/// Completion message consumed by a supervisor's control loop.
pub(crate) struct Report {
    pub(crate) task: SupervisedTask,
    pub(crate) error: Option<ErrChild>,
}

pub(crate) struct Worker {
    pub(crate) task: SupervisedTask,
    pub(crate) ctx: Context,
    pub(crate) supervisor: Weak<SupervisorInner>,
    pub(crate) events: Publisher,
    pub(crate) reports: Option<mpsc::UnboundedSender<Report>>,
}

impl Worker {
    pub(crate) fn spawn(self) {
        tokio::spawn(self.run());
    }

    async fn run(self) {
        let Worker {
            task,
            ctx,
            supervisor,
            events,
            reports,
        } = self;

        let path = join_path(Some(events.supervisor()), task.name());
        let ctx = ctx.attach(Attachments {
            supervisor: supervisor.clone(),
            task: task.clone(),
            short_name: Arc::clone(task.name_arc()),
            path: Arc::clone(&path),
        });
        task.start(Arc::clone(&path));
        events.emit(|| Event::new(EventKind::TaskStarting).with_task(Arc::clone(&path)));

        let inner = Arc::clone(task.task());
        let outcome = AssertUnwindSafe(async move { inner.run(ctx).await })
            .catch_unwind()
            .await;
        let error = sift(outcome, &path);

        events.emit(|| match &error {
            None => Event::new(EventKind::TaskStopped).with_task(Arc::clone(&path)),
            Some(err) => Event::new(if err.was_panic() {
                EventKind::TaskPanicked
            } else {
                EventKind::TaskFailed
            })
            .with_task(Arc::clone(&path))
            .with_reason(err.error().as_message()),
        });

        task.complete(error.clone());

        let unreported = match reports {
            Some(tx) => tx.send(Report { task, error }).err().map(|e| e.0.task),
            None => Some(task),
        };
        // Nobody collects this report anymore: release the name ourselves.
        if let (Some(task), Some(sup)) = (unreported, supervisor.upgrade()) {
            sup.release_name(&task);
        }
    }
}
