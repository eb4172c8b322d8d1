//! # Single-assignment future with several observation styles.
//!
//! [`Promise`] is created paired with a [`Resolver`]: only the holder of the
//! resolver can set the value, consumers only get the read-only handle.
//!
//! ## Observation styles
//! ```text
//! poll      ─► is_resolved() / value()
//! block     ─► wait(&cancel).await        (returns false if cancel fires first)
//! fan-in    ─► resolved_signal()          (a future usable inside tokio::select!)
//! callback  ─► when_resolved(f)
//! channel   ─► report_to(tx)              (the promise itself is sent on tx)
//! ```
//!
//! ## Resolution sequence
//! ```text
//! resolve(v):
//!   state: Pending ──CAS──► Resolving     (second resolve panics)
//!   value.set(v)
//!   state: ─────────────► Resolved
//!   signal closed (outside any lock)
//!   lock notifications ─► drained = true, take callbacks ─► fire each once
//! ```
//!
//! ## Rules
//! - Exactly one resolution ever succeeds; a second `resolve` is a usage error (panic).
//! - Callbacks registered after resolution run on a fresh tokio task, never on
//!   the registering call stack.
//! - Callbacks registered before resolution run on the resolving call stack.
//!   They must not block or panic: doing so poisons delivery to callbacks
//!   registered after them on the same resolution.
//! - Notification order across callbacks is unspecified.
//! - Multiple registrations (callbacks and channels) coexist.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};

use crate::error::UsageError;

const PENDING: u8 = 0;
const RESOLVING: u8 = 1;
const RESOLVED: u8 = 2;

type Callback<V> = Box<dyn FnOnce(Promise<V>) + Send + 'static>;

struct Notifications<V> {
    drained: bool,
    callbacks: Vec<Callback<V>>,
}

struct Shared<V> {
    state: AtomicU8,
    value: OnceLock<V>,
    done: CancellationToken,
    notify: Mutex<Notifications<V>>,
}

/// Read-only handle to a single-assignment value.
///
/// Cheap to clone: all clones observe the same resolution.
pub struct Promise<V> {
    shared: Arc<Shared<V>>,
}

/// One-shot capability to resolve the paired [`Promise`].
///
/// Deliberately not `Clone`: hand it to whoever owns the result.
pub struct Resolver<V> {
    shared: Arc<Shared<V>>,
}

impl<V> Clone for Promise<V> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<V> std::fmt::Debug for Promise<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Promise")
            .field("resolved", &(self.shared.state.load(Ordering::Acquire) == RESOLVED))
            .finish()
    }
}

impl<V: Send + Sync + 'static> Promise<V> {
    /// Creates an unresolved promise and its resolver.
    ///
    /// # Example
    /// ```
    /// use treesup::Promise;
    ///
    /// let (p, resolve) = Promise::new();
    /// assert!(!p.is_resolved());
    /// resolve.resolve(9);
    /// assert_eq!(p.value(), Some(&9));
    /// ```
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> (Promise<V>, Resolver<V>) {
        let shared = Arc::new(Shared {
            state: AtomicU8::new(PENDING),
            value: OnceLock::new(),
            done: CancellationToken::new(),
            notify: Mutex::new(Notifications {
                drained: false,
                callbacks: Vec::new(),
            }),
        });
        (
            Promise {
                shared: Arc::clone(&shared),
            },
            Resolver { shared },
        )
    }

    /// Non-blocking poll; permanently `true` once resolved.
    pub fn is_resolved(&self) -> bool {
        self.shared.state.load(Ordering::Acquire) == RESOLVED
    }

    /// Returns the resolved value, or `None` while still pending.
    pub fn value(&self) -> Option<&V> {
        if self.is_resolved() {
            self.shared.value.get()
        } else {
            None
        }
    }

    /// Waits until resolved (`true`) or until `cancel` fires first (`false`).
    ///
    /// The token is only observed, never cancelled or consumed.
    pub async fn wait(&self, cancel: &CancellationToken) -> bool {
        if self.is_resolved() {
            return true;
        }
        tokio::select! {
            biased;
            _ = self.shared.done.cancelled() => true,
            _ = cancel.cancelled() => false,
        }
    }

    /// Future completing once the promise resolves.
    ///
    /// Owns its state, so many of them can be combined in one `select!`
    /// without one waiter per promise.
    pub fn resolved_signal(&self) -> WaitForCancellationFutureOwned {
        self.shared.done.clone().cancelled_owned()
    }

    /// Registers `f` to run once the promise is resolved.
    ///
    /// If already resolved, `f` is spawned onto the current tokio runtime
    /// instead of being called inline.
    ///
    /// # Panics
    /// Registering on an already-resolved promise outside a tokio runtime panics.
    pub fn when_resolved<F>(&self, f: F)
    where
        F: FnOnce(Promise<V>) + Send + 'static,
    {
        let mut notify = lock(&self.shared.notify);
        if notify.drained {
            drop(notify);
            let me = self.clone();
            tokio::spawn(async move { f(me) });
        } else {
            notify.callbacks.push(Box::new(f));
        }
    }

    /// Sends this promise on `tx` once resolved (immediately, on a fresh task, if
    /// already resolved). A closed receiver is ignored.
    pub fn report_to(&self, tx: mpsc::UnboundedSender<Promise<V>>) {
        self.when_resolved(move |p| {
            let _ = tx.send(p);
        });
    }
}

impl<V: Send + Sync + 'static> Resolver<V> {
    /// Sets the value and notifies every observer.
    ///
    /// # Panics
    /// Panics with [`UsageError::ResolvedTwice`] if called a second time.
    pub fn resolve(&self, value: V) {
        let shared = &self.shared;
        if shared
            .state
            .compare_exchange(PENDING, RESOLVING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            panic!("{}", UsageError::ResolvedTwice);
        }
        let _ = shared.value.set(value);
        shared.state.store(RESOLVED, Ordering::Release);
        shared.done.cancel();

        let callbacks = {
            let mut notify = lock(&shared.notify);
            notify.drained = true;
            std::mem::take(&mut notify.callbacks)
        };
        let me = Promise {
            shared: Arc::clone(shared),
        };
        for cb in callbacks {
            cb(me.clone());
        }
    }

    /// Read-only handle to the promise this resolver controls.
    pub fn promise(&self) -> Promise<V> {
        Promise {
            shared: Arc::clone(&self.shared),
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[tokio::test]
    async fn every_observation_style_sees_the_value() {
        let (p, resolve) = Promise::<i32>::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::new();

        {
            let p = p.clone();
            let seen = seen.clone();
            handles.push(tokio::spawn(async move {
                assert!(p.wait(&CancellationToken::new()).await);
                assert_eq!(p.value(), Some(&9));
                seen.fetch_add(1, Ordering::SeqCst);
            }));
        }
        {
            let p = p.clone();
            let seen = seen.clone();
            handles.push(tokio::spawn(async move {
                p.resolved_signal().await;
                assert_eq!(p.value(), Some(&9));
                seen.fetch_add(1, Ordering::SeqCst);
            }));
        }
        let (cb_tx, mut cb_rx) = mpsc::unbounded_channel();
        p.when_resolved(move |p| {
            let _ = cb_tx.send(*p.value().unwrap());
        });
        let (report_tx, mut report_rx) = mpsc::unbounded_channel();
        p.report_to(report_tx);

        tokio::task::yield_now().await;
        resolve.resolve(9);

        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(seen.load(Ordering::SeqCst), 2);
        assert_eq!(cb_rx.recv().await, Some(9));
        let reported = report_rx.recv().await.unwrap();
        assert_eq!(reported.value(), Some(&9));
    }

    #[tokio::test]
    async fn late_registrations_fire_asynchronously() {
        let (p, resolve) = Promise::<&'static str>::new();
        resolve.resolve("done");

        let fired = Arc::new(AtomicUsize::new(0));
        let f = fired.clone();
        p.when_resolved(move |_| {
            f.fetch_add(1, Ordering::SeqCst);
        });
        // Not on the registering stack.
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        let (tx, mut rx) = mpsc::unbounded_channel();
        p.report_to(tx);
        assert!(rx.recv().await.unwrap().is_resolved());

        tokio::time::timeout(Duration::from_secs(1), async {
            while fired.load(Ordering::SeqCst) == 0 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn wait_returns_false_on_cancel() {
        let (p, _resolve) = Promise::<()>::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(!p.wait(&cancel).await);
        assert!(p.value().is_none());
    }

    #[test]
    fn resolved_state_is_permanent() {
        let (p, resolve) = Promise::new();
        assert!(p.value().is_none());
        resolve.resolve(String::from("v"));
        assert!(p.is_resolved());
        assert!(resolve.promise().is_resolved());
        assert_eq!(p.value().map(String::as_str), Some("v"));
    }

    #[test]
    #[should_panic(expected = "promise resolved more than once")]
    fn second_resolve_panics() {
        let (_p, resolve) = Promise::new();
        resolve.resolve(1);
        resolve.resolve(2);
    }
}
