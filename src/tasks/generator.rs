//! # Task sources.
//!
//! - [`TaskGen`]: a read-only, closable generator of tasks consumed by a stream
//!   supervisor. Closing every sender ends admission.
//! - [`tasks_from_map`]: turns keyed work items into named tasks, one per entry,
//!   for fork-join fan-out.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::core::Context;
use crate::error::TaskError;
use crate::tasks::task::TaskRef;
use crate::tasks::task_fn::TaskFn;

/// Receiving end of a stream of tasks.
///
/// # Example
/// ```
/// use treesup::{Context, TaskError, TaskFn, TaskGen, TaskRef};
///
/// # async fn demo() {
/// let (tx, tasks) = TaskGen::channel(16);
/// let job: TaskRef = TaskFn::arc(|_ctx: Context| async { Ok::<_, TaskError>(()) });
/// tx.send(job).await.unwrap();
/// drop(tx); // closes the generator
/// # let _ = tasks;
/// # }
/// ```
#[derive(Debug)]
pub struct TaskGen {
    rx: mpsc::Receiver<TaskRef>,
}

impl TaskGen {
    /// Creates a bounded generator and the sender feeding it.
    pub fn channel(capacity: usize) -> (mpsc::Sender<TaskRef>, TaskGen) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (tx, TaskGen { rx })
    }

    /// Wraps an existing receiver.
    pub fn from_receiver(rx: mpsc::Receiver<TaskRef>) -> Self {
        Self { rx }
    }

    /// A generator pre-filled with `tasks` and already closed.
    pub fn from_tasks(tasks: Vec<TaskRef>) -> Self {
        let (tx, rx) = mpsc::channel(tasks.len().max(1));
        for task in tasks {
            // Capacity covers every task.
            let _ = tx.try_send(task);
        }
        Self { rx }
    }

    /// Next task, or `None` once every sender is gone and the buffer is drained.
    pub(crate) async fn next(&mut self) -> Option<TaskRef> {
        self.rx.recv().await
    }
}

/// Builds one named task per `(key, value)` entry; each runs `f(ctx, key, value)`.
///
/// Tasks are named after their key, so paths read `group/<key>`.
///
/// # Example
/// ```
/// use std::collections::BTreeMap;
/// use treesup::{Context, TaskError, tasks_from_map};
///
/// let input = BTreeMap::from([("a", 1), ("b", 2)]);
/// let tasks = tasks_from_map(input, |_ctx: Context, _k: &str, v: i32| async move {
///     let _ = v + 4;
///     Ok::<_, TaskError>(())
/// });
/// assert_eq!(tasks.len(), 2);
/// assert_eq!(tasks[0].name(), Some("a"));
/// ```
pub fn tasks_from_map<K, V, F, Fut>(entries: impl IntoIterator<Item = (K, V)>, f: F) -> Vec<TaskRef>
where
    K: Display + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    F: Fn(Context, K, V) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
{
    let f = Arc::new(f);
    entries
        .into_iter()
        .map(|(k, v)| {
            let f = Arc::clone(&f);
            let name = k.to_string();
            let task: TaskRef =
                TaskFn::named_arc(name, move |ctx: Context| (*f)(ctx, k.clone(), v.clone()));
            task
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn from_tasks_is_closed_after_draining() {
        let noop = |_ctx: Context| async { Ok::<_, TaskError>(()) };
        let a: TaskRef = TaskFn::arc(noop);
        let b: TaskRef = TaskFn::arc(noop);
        let mut tasks = TaskGen::from_tasks(vec![a, b]);
        assert!(tasks.next().await.is_some());
        assert!(tasks.next().await.is_some());
        assert!(tasks.next().await.is_none());
    }

    #[test]
    fn map_entries_become_named_tasks() {
        let tasks = tasks_from_map(vec![("x", 1), ("y", 2)], |_ctx: Context, _k, _v: i32| async {
            Ok::<_, TaskError>(())
        });
        let names: Vec<_> = tasks.iter().map(|t| t.name().unwrap().to_string()).collect();
        assert_eq!(names, ["x", "y"]);
    }
}
