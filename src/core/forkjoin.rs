//! # Fork-join supervision.
//!
//! A fixed, fully known set of tasks, all launched together when the
//! supervisor starts running. Once every task reported the supervisor halts,
//! with the first escalated error (if any) as its result.

use std::sync::Arc;

use crate::core::supervisor::Supervisor;
use crate::tasks::TaskRef;

/// Supervisor over `tasks`, launched concurrently once it runs.
///
/// Duplicate task names are resolved by the default name strategy
/// (`"job"`, `"job+1"`, ...).
///
/// # Example
/// ```rust
/// use treesup::{Context, TaskError, TaskFn, TaskRef, supervise_fork_join, supervise_root};
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() {
///     let tasks: Vec<TaskRef> = vec![
///         TaskFn::named_arc("one", |_ctx: Context| async { Ok::<_, TaskError>(()) }),
///         TaskFn::named_arc("two", |_ctx: Context| async { Ok::<_, TaskError>(()) }),
///     ];
///     let group = supervise_fork_join("main", tasks);
///     assert!(supervise_root(Context::background(), group).await.is_ok());
/// }
/// ```
pub fn supervise_fork_join(name: impl Into<Arc<str>>, tasks: Vec<TaskRef>) -> Supervisor {
    Supervisor::builder(name).with_tasks(tasks).build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    use tokio::sync::oneshot;

    use crate::core::{
        Context, ErrorReactor, NameStrategy, Phase, Reaction, SupervisedTask, SupervisionWarning,
        TaskPhase, WarningHandler, supervise_root,
    };
    use crate::error::TaskError;
    use crate::tasks::{TaskFn, tasks_from_map};

    fn recording(name: &'static str, seen: Arc<Mutex<Vec<String>>>) -> TaskRef {
        TaskFn::named_arc(name, move |ctx: Context| {
            let seen = Arc::clone(&seen);
            async move {
                seen.lock().unwrap().push(ctx.task_path().to_string());
                Ok::<_, TaskError>(())
            }
        })
    }

    async fn until_cancelled(ctx: Context) -> Result<(), TaskError> {
        tokio::select! {
            _ = ctx.cancelled() => Err(ctx.err().unwrap_or(TaskError::Canceled)),
            _ = tokio::time::sleep(Duration::from_secs(60)) => Ok(()),
        }
    }

    #[tokio::test]
    async fn named_tasks_run_under_group_paths() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let tasks = ["one", "two", "three"]
            .into_iter()
            .map(|name| recording(name, Arc::clone(&seen)))
            .collect();

        let group = supervise_fork_join("main", tasks);
        supervise_root(Context::background(), group.clone())
            .await
            .unwrap();

        let mut paths = seen.lock().unwrap().clone();
        paths.sort();
        assert_eq!(paths, ["main/one", "main/three", "main/two"]);
        assert_eq!(group.phase(), Phase::Halted);
        assert_eq!(group.path(), Some("main"));
        assert!(group.first_error().is_none());
        assert!(group.tasks().is_empty());
    }

    #[tokio::test]
    async fn all_succeeding_tasks_launch_and_report_once() {
        let launched = Arc::new(AtomicUsize::new(0));
        let sup = Supervisor::new("main");
        let handles: Vec<_> = (0..10)
            .map(|_| {
                let launched = Arc::clone(&launched);
                sup.submit(TaskFn::arc(move |_ctx: Context| {
                    let launched = Arc::clone(&launched);
                    async move {
                        launched.fetch_add(1, Ordering::SeqCst);
                        Ok::<_, TaskError>(())
                    }
                }))
            })
            .collect();
        assert!(handles.iter().all(|h| h.phase() == TaskPhase::Gated));

        sup.run(Context::background()).await.unwrap();

        assert_eq!(launched.load(Ordering::SeqCst), 10);
        for h in &handles {
            assert_eq!(h.phase(), TaskPhase::Done);
            assert!(h.promise().value().is_some_and(|r| r.is_ok()));
        }
    }

    #[tokio::test]
    async fn failing_item_cancels_busy_siblings() {
        let items = BTreeMap::from([("a", 1), ("b", 2), ("c", 3), ("d", 4)]);
        let tasks = tasks_from_map(items, |ctx: Context, _key: &str, value: i32| async move {
            match value {
                1 => Ok(()),
                3 => {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    Err(TaskError::fail("bad item 3"))
                }
                _ => until_cancelled(ctx).await,
            }
        });
        let sup = Supervisor::new("main");
        let handles: Vec<_> = tasks.into_iter().map(|t| sup.submit(t)).collect();

        let err = sup.run(Context::background()).await.unwrap_err();

        let child = err.as_child().unwrap();
        assert_eq!(child.task(), "main/c");
        assert!(!child.was_panic());
        assert!(matches!(child.error(), TaskError::Fail { error } if error == "bad item 3"));

        let by_name = |name: &str| handles.iter().find(|h| h.name() == name).unwrap();
        assert!(by_name("a").error().is_none());
        assert!(by_name("b").error().unwrap().error().is_cancellation());
        assert!(by_name("d").error().unwrap().error().is_cancellation());
        assert_eq!(sup.first_error().unwrap().task(), "main/c");
    }

    #[tokio::test]
    async fn duplicate_names_get_suffixed() {
        let noop = |_ctx: Context| async { Ok::<_, TaskError>(()) };
        let sup = Supervisor::new("main");
        let first = sup.submit(TaskFn::named_arc("job", noop));
        let second = sup.submit(TaskFn::named_arc("job", noop));
        assert_eq!(first.name(), "job");
        assert_eq!(second.name(), "job+1");
        assert_eq!(sup.tasks(), ["job", "job+1"]);

        sup.run(Context::background()).await.unwrap();
        assert_eq!(second.path(), Some("main/job+1"));
    }

    #[tokio::test]
    async fn panics_become_flagged_errors() {
        let tasks: Vec<TaskRef> = vec![
            TaskFn::named_arc("calm", |_ctx: Context| async { Ok::<_, TaskError>(()) }),
            TaskFn::named_arc("boom", |_ctx: Context| async {
                if true {
                    panic!("kaboom");
                }
                Ok::<_, TaskError>(())
            }),
        ];
        let err = supervise_fork_join("main", tasks)
            .run(Context::background())
            .await
            .unwrap_err();

        let child = err.as_child().unwrap();
        assert!(child.was_panic());
        assert_eq!(child.task(), "main/boom");
        assert!(matches!(child.error(), TaskError::Panic { message } if message == "kaboom"));
    }

    #[tokio::test]
    #[should_panic(expected = "can only be run once")]
    async fn second_run_panics() {
        let sup = Supervisor::new("main");
        sup.run(Context::background()).await.unwrap();
        let _ = sup.run(Context::background()).await;
    }

    #[tokio::test]
    async fn ignored_errors_do_not_escalate() {
        let sup = Supervisor::builder("main")
            .error_reactor(ErrorReactor::always(Reaction::Ignore))
            .build();
        let bad = sup.submit(TaskFn::named_arc("bad", |_ctx: Context| async {
            Err::<(), _>(TaskError::fail("ignored"))
        }));
        let slow = sup.submit(TaskFn::named_arc("slow", |ctx: Context| async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            assert!(!ctx.is_cancelled());
            Ok::<_, TaskError>(())
        }));

        sup.run(Context::background()).await.unwrap();
        assert!(bad.error().is_some());
        assert!(slow.error().is_none());
        assert_eq!(sup.phase(), Phase::Halted);
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_abort_does_not_wait_for_stragglers() {
        let sup = Supervisor::builder("main")
            .error_reactor(ErrorReactor::always(Reaction::AbortRapidly))
            .build();
        sup.submit(TaskFn::named_arc("bad", |_ctx: Context| async {
            Err::<(), _>(TaskError::fail("fatal"))
        }));
        let deaf = sup.submit(TaskFn::named_arc("deaf", |_ctx: Context| async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok::<_, TaskError>(())
        }));

        let start = tokio::time::Instant::now();
        let err = sup.run(Context::background()).await.unwrap_err();

        assert!(start.elapsed() < Duration::from_secs(3600));
        assert_eq!(err.as_child().unwrap().task(), "main/bad");
        assert_eq!(sup.phase(), Phase::Aborted);
        assert!(!deaf.promise().is_resolved());
    }

    #[tokio::test]
    async fn quit_aggressively_returns_aborted() {
        let sup = Supervisor::new("main");
        let (started_tx, started_rx) = oneshot::channel();
        let started_tx = Mutex::new(Some(started_tx));
        sup.submit(TaskFn::named_arc("waiter", move |ctx: Context| {
            if let Some(tx) = started_tx.lock().unwrap().take() {
                let _ = tx.send(());
            }
            until_cancelled(ctx)
        }));

        let runner = {
            let sup = sup.clone();
            tokio::spawn(async move { sup.run(Context::background()).await })
        };
        started_rx.await.unwrap();
        sup.quit_aggressively();

        let result = runner.await.unwrap();
        assert!(matches!(result, Err(TaskError::Aborted)));
        assert_eq!(sup.phase(), Phase::Aborted);
    }

    #[tokio::test]
    async fn parent_cancellation_winds_down() {
        let ctx = Context::background();
        let sup = Supervisor::new("main");
        let (started_tx, started_rx) = oneshot::channel();
        let started_tx = Mutex::new(Some(started_tx));
        let worker = sup.submit(TaskFn::named_arc("worker", move |ctx: Context| {
            if let Some(tx) = started_tx.lock().unwrap().take() {
                let _ = tx.send(());
            }
            until_cancelled(ctx)
        }));

        let runner = {
            let sup = sup.clone();
            let ctx = ctx.clone();
            tokio::spawn(async move { sup.run(ctx).await })
        };
        started_rx.await.unwrap();
        ctx.cancel();

        let err = runner.await.unwrap().unwrap_err();
        let child = err.as_child().unwrap();
        assert_eq!(child.task(), "main");
        assert!(matches!(child.error(), TaskError::Canceled));
        assert!(worker.error().unwrap().error().is_cancellation());
        assert_eq!(sup.phase(), Phase::Halted);
    }

    #[tokio::test(start_paused = true)]
    async fn stragglers_are_reported_to_the_warning_handler() {
        let warnings = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&warnings);
        let sup = Supervisor::builder("main")
            .straggler_warning(Some(Duration::from_secs(1)))
            .warning_handler(WarningHandler::new(move |w| {
                if let SupervisionWarning::Stragglers { waiting, .. } = w {
                    sink.lock().unwrap().push(waiting.clone());
                }
                Ok(())
            }))
            .build();
        sup.submit(TaskFn::named_arc("bad", |_ctx: Context| async {
            Err::<(), _>(TaskError::fail("bad"))
        }));
        sup.submit(TaskFn::named_arc("slow", |_ctx: Context| async {
            tokio::time::sleep(Duration::from_millis(3500)).await;
            Ok::<_, TaskError>(())
        }));

        let err = sup.run(Context::background()).await.unwrap_err();
        assert_eq!(err.as_child().unwrap().task(), "main/bad");

        let warnings = warnings.lock().unwrap();
        assert_eq!(warnings.len(), 3);
        assert_eq!(&*warnings[0][0], "slow");
    }

    #[tokio::test(start_paused = true)]
    async fn failing_warning_handler_aborts() {
        let sup = Supervisor::builder("main")
            .straggler_warning(Some(Duration::from_secs(1)))
            .warning_handler(WarningHandler::new(|_| Err(TaskError::fail("stuck"))))
            .build();
        sup.submit(TaskFn::named_arc("deaf", |_ctx: Context| async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok::<_, TaskError>(())
        }));
        sup.submit(TaskFn::named_arc("bad", |_ctx: Context| async {
            Err::<(), _>(TaskError::fail("bad"))
        }));

        let start = tokio::time::Instant::now();
        let err = sup.run(Context::background()).await.unwrap_err();

        assert!(start.elapsed() < Duration::from_secs(2));
        assert_eq!(sup.phase(), Phase::Aborted);
        assert!(matches!(err.root_cause(), TaskError::Fail { error } if error == "bad"));
    }

    #[tokio::test]
    async fn submissions_while_winding_down_are_lame() {
        let late_saw_cancel = Arc::new(AtomicBool::new(false));
        let (late_tx, late_rx) = oneshot::channel();
        let late_tx = Mutex::new(Some(late_tx));

        let sup = Supervisor::new("main");
        sup.submit(TaskFn::named_arc("bad", |_ctx: Context| async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            Err::<(), _>(TaskError::fail("bad"))
        }));
        {
            let late_saw_cancel = Arc::clone(&late_saw_cancel);
            sup.submit(TaskFn::named_arc("spawner", move |ctx: Context| {
                let late_saw_cancel = Arc::clone(&late_saw_cancel);
                let late_tx = late_tx.lock().unwrap().take();
                async move {
                    ctx.cancelled().await;
                    let parent = ctx.supervisor().unwrap();
                    let late = parent.submit(TaskFn::named_arc("late", move |ctx: Context| {
                        let late_saw_cancel = Arc::clone(&late_saw_cancel);
                        async move {
                            late_saw_cancel.store(ctx.is_cancelled(), Ordering::SeqCst);
                            Ok::<_, TaskError>(())
                        }
                    }));
                    if let Some(tx) = late_tx {
                        let _ = tx.send(late);
                    }
                    Err(TaskError::Canceled)
                }
            }));
        }

        let err = sup.run(Context::background()).await.unwrap_err();
        assert_eq!(err.as_child().unwrap().task(), "main/bad");

        let late = late_rx.await.unwrap();
        assert!(late.is_lame());
        late.promise().resolved_signal().await;
        assert!(late_saw_cancel.load(Ordering::SeqCst));
    }

    /// Task `a` submits `b` to its own supervisor, then returns at once.
    fn submits_sibling(b: TaskRef, handle: Arc<Mutex<Option<SupervisedTask>>>) -> TaskRef {
        TaskFn::named_arc("a", move |ctx: Context| {
            let b = Arc::clone(&b);
            let handle = Arc::clone(&handle);
            async move {
                let sup = ctx.supervisor().unwrap();
                *handle.lock().unwrap() = Some(sup.submit(b));
                Ok::<_, TaskError>(())
            }
        })
    }

    #[tokio::test]
    async fn siblings_submitted_by_exiting_children_are_collected() {
        for _ in 0..20 {
            let saw_cancel = Arc::new(Mutex::new(None));
            let handle = Arc::new(Mutex::new(None));
            let b: TaskRef = {
                let saw_cancel = Arc::clone(&saw_cancel);
                TaskFn::named_arc("b", move |ctx: Context| {
                    let saw_cancel = Arc::clone(&saw_cancel);
                    async move {
                        *saw_cancel.lock().unwrap() = Some(ctx.is_cancelled());
                        Ok::<_, TaskError>(())
                    }
                })
            };

            let sup = supervise_fork_join("main", vec![submits_sibling(b, Arc::clone(&handle))]);
            sup.run(Context::background()).await.unwrap();

            let b = handle.lock().unwrap().take().unwrap();
            assert!(!b.is_lame());
            assert_eq!(b.phase(), TaskPhase::Done);
            assert_eq!(*saw_cancel.lock().unwrap(), Some(false));
            assert_eq!(sup.phase(), Phase::Halted);
        }
    }

    #[tokio::test]
    async fn failing_late_sibling_decides_the_result() {
        let handle = Arc::new(Mutex::new(None));
        let b: TaskRef = TaskFn::named_arc("b", |ctx: Context| async move {
            if ctx.is_cancelled() {
                return Err::<(), _>(TaskError::Canceled);
            }
            Err(TaskError::fail("b broke"))
        });

        let sup = supervise_fork_join("main", vec![submits_sibling(b, Arc::clone(&handle))]);
        let err = sup.run(Context::background()).await.unwrap_err();

        let child = err.as_child().unwrap();
        assert_eq!(child.task(), "main/b");
        assert!(matches!(child.error(), TaskError::Fail { error } if error == "b broke"));
        assert!(!handle.lock().unwrap().as_ref().unwrap().is_lame());
    }

    #[test]
    #[should_panic(expected = "no free task name")]
    fn exhausted_names_panic_on_submit() {
        let sup = Supervisor::builder("main")
            .name_strategy(NameStrategy::new(|_, _, _| "fixed".to_string()))
            .build();
        let job = || -> TaskRef {
            TaskFn::named_arc("job", |_ctx: Context| async { Ok::<_, TaskError>(()) })
        };
        sup.submit(job());
        sup.submit(job());
    }
}
