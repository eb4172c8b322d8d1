//! # Supervisor control loop.
//!
//! Exactly one [`ControlLoop`] exists per running supervisor, owned by the
//! caller of `run`. It is the only writer of the live-task map and the phase.
//!
//! ```text
//! running:      admit queued submissions, then
//!               select { quit | parent cancelled | admit | report | next from source }
//!                 ├─ report error → reactor: Error ─► winding_down
//!                 │                          Ignore ─► keep running
//!                 │                          AbortRapidly ─► finish(Aborted)
//!                 ├─ source closed → collect remaining reports
//!                 └─ nothing live, no source, return-on-empty → finish(Halted)
//!
//! winding_down: cancel children; select { quit | report | admit (lame) | straggler tick }
//!                 until nothing is live
//!
//! finish:       cancel children, close submissions, publish terminal phase,
//!               return first error
//! ```

use std::collections::HashMap;
use std::future::pending;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, Interval, interval_at};

use crate::core::context::Context;
use crate::core::publisher::Publisher;
use crate::core::reaction::{Reaction, SupervisionWarning};
use crate::core::supervised::SupervisedTask;
use crate::core::supervisor::{Phase, Supervisor};
use crate::core::worker::{Report, Worker};
use crate::error::{ErrChild, TaskError};
use crate::events::{Event, EventKind};
use crate::tasks::{TaskGen, TaskRef};

/// Messages from `submit` (and setters) to a running control loop.
pub(crate) enum Control {
    Admit(SupervisedTask),
    /// Configuration changed; re-evaluate the exit condition.
    Poke,
}

enum Exit {
    Drained,
    WindDown,
    Abort,
}

pub(crate) struct ControlLoop {
    sup: Supervisor,
    run_ctx: Context,
    group: Context,
    events: Publisher,
    live: HashMap<Arc<str>, SupervisedTask>,
    first: Option<ErrChild>,
    reports_tx: mpsc::UnboundedSender<Report>,
    reports_rx: mpsc::UnboundedReceiver<Report>,
    control: mpsc::UnboundedReceiver<Control>,
    source: Option<TaskGen>,
}

impl ControlLoop {
    pub(crate) fn new(
        sup: Supervisor,
        run_ctx: Context,
        group: Context,
        events: Publisher,
        control: mpsc::UnboundedReceiver<Control>,
        source: Option<TaskGen>,
    ) -> Self {
        let (reports_tx, reports_rx) = mpsc::unbounded_channel();
        Self {
            sup,
            run_ctx,
            group,
            events,
            live: HashMap::new(),
            first: None,
            reports_tx,
            reports_rx,
            control,
            source,
        }
    }

    /// Runs the phase machine to completion and returns the aggregate result.
    pub(crate) async fn supervise(mut self) -> Result<(), TaskError> {
        let exit = match self.running().await {
            Exit::WindDown => self.winding_down().await,
            exit => exit,
        };
        self.finish(exit)
    }

    pub(crate) fn launch(&mut self, task: SupervisedTask) {
        self.live.insert(Arc::clone(task.name_arc()), task.clone());
        Worker {
            task,
            ctx: self.group.clone(),
            supervisor: Arc::downgrade(self.sup.inner()),
            events: self.events.clone(),
            reports: Some(self.reports_tx.clone()),
        }
        .spawn();
    }

    async fn running(&mut self) -> Exit {
        loop {
            if let Some(exit) = self.admit_queued() {
                return exit;
            }
            if self.live.is_empty() && self.source.is_none() && self.return_on_empty() {
                return Exit::Drained;
            }
            tokio::select! {
                biased;
                _ = self.sup.inner().quit().cancelled() => return Exit::Abort,
                _ = self.run_ctx.cancelled() => {
                    if let Some(err) = self.run_ctx.err() {
                        let path = Arc::clone(self.events.supervisor());
                        self.record(ErrChild::new(err, false, path));
                    }
                    return Exit::WindDown;
                }
                Some(ctrl) = self.control.recv() => {
                    if let Some(exit) = self.on_control(ctrl) {
                        return exit;
                    }
                }
                Some(report) = self.reports_rx.recv() => {
                    if let Some(exit) = self.on_report(report) {
                        return exit;
                    }
                }
                next = next_task(&mut self.source) => match next {
                    Some(task) => {
                        let task = self.sup.register_generated(task);
                        self.events.emit(|| {
                            Event::new(EventKind::TaskSubmitted).with_task(Arc::clone(task.name_arc()))
                        });
                        self.launch(task);
                    }
                    None => {
                        tracing::debug!(supervisor = %self.events.supervisor(), "source closed; collecting");
                        self.source = None;
                    }
                },
            }
        }
    }

    async fn winding_down(&mut self) -> Exit {
        self.source = None;
        self.group.cancel();
        self.sup.inner().set_phase(Phase::WindingDown);
        if let Some(exit) = self.admit_queued() {
            return exit;
        }
        if self.live.is_empty() {
            return Exit::Drained;
        }
        let reason = self.first.as_ref().map(|e| e.error().as_message());
        self.events.emit(|| {
            let ev = Event::new(EventKind::WindingDown);
            match reason {
                Some(reason) => ev.with_reason(reason),
                None => ev,
            }
        });

        let started = Instant::now();
        let period = self.sup.inner().config().straggler_period();
        let mut stragglers = period.map(|p| interval_at(started + p, p));

        loop {
            if let Some(exit) = self.admit_queued() {
                return exit;
            }
            if self.live.is_empty() {
                return Exit::Drained;
            }
            tokio::select! {
                biased;
                _ = self.sup.inner().quit().cancelled() => return Exit::Abort,
                Some(ctrl) = self.control.recv() => {
                    if let Some(exit) = self.on_control(ctrl) {
                        return exit;
                    }
                }
                Some(report) = self.reports_rx.recv() => {
                    if let Some(Exit::Abort) = self.on_report(report) {
                        return Exit::Abort;
                    }
                }
                _ = tick(&mut stragglers) => {
                    if self.warn_stragglers(started.elapsed()).is_err() {
                        return Exit::Abort;
                    }
                }
            }
        }
    }

    fn finish(mut self, exit: Exit) -> Result<(), TaskError> {
        self.group.cancel();
        let aborted = matches!(exit, Exit::Abort);
        let phase = if aborted { Phase::Aborted } else { Phase::Halted };
        self.sup.inner().set_phase(phase);

        self.control.close();
        while let Ok(ctrl) = self.control.try_recv() {
            if let Control::Admit(task) = ctrl {
                task.mark_lame();
                Worker {
                    task,
                    ctx: self.group.clone(),
                    supervisor: Arc::downgrade(self.sup.inner()),
                    events: self.events.clone(),
                    reports: None,
                }
                .spawn();
            }
        }

        let reason = self.first.as_ref().map(|e| e.error().as_message());
        let kind = if aborted {
            EventKind::Aborted
        } else {
            EventKind::Halted
        };
        self.events.emit(|| match reason {
            Some(reason) => Event::new(kind).with_reason(reason),
            None => Event::new(kind),
        });
        if aborted {
            tracing::warn!(
                supervisor = %self.events.supervisor(),
                abandoned = self.live.len(),
                "supervisor aborted without waiting for children"
            );
        } else {
            tracing::debug!(supervisor = %self.events.supervisor(), "supervisor halted");
        }

        match self.first.take() {
            Some(err) => Err(TaskError::Child(err)),
            None if aborted => Err(TaskError::Aborted),
            None => Ok(()),
        }
    }

    /// Removes the reporter from the live set and applies the error reactor.
    fn on_report(&mut self, report: Report) -> Option<Exit> {
        let Report { task, error } = report;
        if self
            .live
            .get(task.name_arc())
            .is_some_and(|live| live.same(&task))
        {
            self.live.remove(task.name_arc());
        }
        self.sup.inner().release_name(&task);

        let err = error?;
        let reactor = self.sup.inner().config().error_reactor.clone();
        match reactor.react(&err) {
            Reaction::Ignore => None,
            Reaction::Error => {
                self.record(err);
                Some(Exit::WindDown)
            }
            Reaction::AbortRapidly => {
                self.record(err);
                Some(Exit::Abort)
            }
        }
    }

    /// Handles submissions already queued, so none is mistaken for one
    /// arriving after the group emptied.
    fn admit_queued(&mut self) -> Option<Exit> {
        while let Ok(ctrl) = self.control.try_recv() {
            if let Some(exit) = self.on_control(ctrl) {
                return Some(exit);
            }
        }
        None
    }

    fn on_control(&mut self, ctrl: Control) -> Option<Exit> {
        let Control::Admit(task) = ctrl else {
            return None;
        };
        if self.sup.phase() < Phase::WindingDown {
            self.launch(task);
            return None;
        }

        task.mark_lame();
        let warning = SupervisionWarning::LameSubmission {
            supervisor: Arc::clone(self.events.supervisor()),
            task: Arc::clone(task.name_arc()),
        };
        self.launch(task);
        match self.sup.inner().warn(&warning) {
            Ok(()) => None,
            Err(err) => {
                self.escalate_warning(err);
                Some(Exit::Abort)
            }
        }
    }

    fn warn_stragglers(&mut self, waited: Duration) -> Result<(), TaskError> {
        let mut waiting: Vec<Arc<str>> = self.live.keys().cloned().collect();
        waiting.sort_unstable();
        let listed = waiting.join(", ");
        self.events.emit(|| Event::new(EventKind::StragglersWarning).with_reason(listed));

        let warning = SupervisionWarning::Stragglers {
            supervisor: Arc::clone(self.events.supervisor()),
            waiting,
            waited,
        };
        let result = self.sup.inner().warn(&warning);
        if let Err(err) = &result {
            self.escalate_warning(err.clone());
        }
        result
    }

    fn escalate_warning(&mut self, err: TaskError) {
        let path = Arc::clone(self.events.supervisor());
        self.record(ErrChild::new(err, false, path));
    }

    /// Keeps the first error only; later ones stay on their task handles.
    fn record(&mut self, err: ErrChild) {
        if self.first.is_none() {
            self.sup.inner().record_first_error(&err);
            self.first = Some(err);
        }
    }

    fn return_on_empty(&self) -> bool {
        self.sup.inner().config().return_on_empty
    }
}

async fn next_task(source: &mut Option<TaskGen>) -> Option<TaskRef> {
    match source {
        Some(source) => source.next().await,
        None => pending().await,
    }
}

async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => pending().await,
    }
}
