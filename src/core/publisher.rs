//! # Event publishing scoped to one supervisor.
//!
//! Every running supervisor holds a [`Publisher`]: the bus it reports on plus
//! its own path, stamped onto each event. A supervisor configured with
//! subscribers owns a fresh bus and a [`Listener`] that fans events out to its
//! [`SubscriberSet`]; any other supervisor reuses its parent's bus, so one
//! subscriber set observes a whole subtree.
//!
//! ```text
//! control loop / workers ──► Publisher::emit ──► Bus ──► Listener ──► SubscriberSet
//! ```

use std::sync::Arc;

use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::events::{Bus, Event};
use crate::subscribers::{Subscribe, SubscriberSet};

/// Bus handle plus the supervisor path events are attributed to.
#[derive(Clone)]
pub(crate) struct Publisher {
    bus: Option<Bus>,
    supervisor: Arc<str>,
}

impl Publisher {
    pub(crate) fn new(bus: Option<Bus>, supervisor: Arc<str>) -> Self {
        Self { bus, supervisor }
    }

    /// Bus inherited by nested supervisors.
    pub(crate) fn bus(&self) -> Option<&Bus> {
        self.bus.as_ref()
    }

    pub(crate) fn supervisor(&self) -> &Arc<str> {
        &self.supervisor
    }

    /// Builds and publishes an event; `build` is skipped when nobody listens.
    pub(crate) fn emit(&self, build: impl FnOnce() -> Event) {
        if let Some(bus) = &self.bus {
            bus.publish(build().with_supervisor(Arc::clone(&self.supervisor)));
        }
    }
}

/// Forwards bus events to a subscriber set until stopped.
pub(crate) struct Listener {
    stop: CancellationToken,
    handle: JoinHandle<()>,
}

impl Listener {
    /// Creates a bus, attaches `subs` to it and starts forwarding.
    pub(crate) fn spawn(subs: Vec<Arc<dyn Subscribe>>) -> (Bus, Self) {
        let bus = Bus::default();
        let set = SubscriberSet::new(subs, bus.clone());
        let mut rx = bus.subscribe();
        let stop = CancellationToken::new();
        let stopped = stop.clone();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    msg = rx.recv() => match msg {
                        Ok(ev) => set.emit(&ev),
                        Err(RecvError::Lagged(_)) => continue,
                        Err(RecvError::Closed) => break,
                    },
                    _ = stopped.cancelled() => {
                        loop {
                            match rx.try_recv() {
                                Ok(ev) => set.emit(&ev),
                                Err(TryRecvError::Lagged(_)) => continue,
                                Err(_) => break,
                            }
                        }
                        break;
                    }
                }
            }
            set.shutdown().await;
        });
        (bus, Self { stop, handle })
    }

    /// Delivers what is already on the bus, then waits for subscriber workers.
    pub(crate) async fn shutdown(self) {
        self.stop.cancel();
        let _ = self.handle.await;
    }
}
