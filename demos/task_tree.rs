//! # Example: Nested supervision tree
//!
//! ```text
//! main
//! ├── api           (runs until cancelled)
//! └── indexer       (becomes a supervisor via new_supervisor)
//!     ├── shard-%   (wildcard names: shard-0, shard-1, ...)
//!     └── shard-%   (one shard panics)
//! ```
//!
//! The panic is caught, reported as a flagged child error, cancels the other
//! shard, escalates through `indexer` and winds down `main`.
//!
//! Run with: `cargo run --example task_tree`

use std::time::Duration;

use treesup::{
    Context, NameStrategy, TaskError, TaskFn, TaskRef, new_supervisor, supervise_fork_join,
    supervise_root,
};

fn shard(explode: bool) -> TaskRef {
    TaskFn::named_arc("shard-%", move |ctx: Context| async move {
        println!("[{}] indexing", ctx.task_path());
        if explode {
            tokio::time::sleep(Duration::from_millis(100)).await;
            panic!("corrupt segment");
        }
        ctx.cancelled().await;
        println!("[{}] stopping", ctx.task_path());
        Ok::<_, TaskError>(())
    })
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "debug".into()),
        )
        .init();

    let api: TaskRef = TaskFn::named_arc("api", |ctx: Context| async move {
        println!("[{}] serving", ctx.task_path());
        ctx.cancelled().await;
        println!("[{}] shutting down", ctx.task_path());
        Ok::<_, TaskError>(())
    });

    let indexer: TaskRef = TaskFn::named_arc("indexer", |ctx: Context| async move {
        let sub = new_supervisor(&ctx);
        sub.set_name_strategy(NameStrategy::wildcard());
        sub.submit(shard(false));
        sub.submit(shard(true));
        sub.run(ctx).await
    });

    let main = supervise_fork_join("main", vec![api, indexer]);
    if let Err(err) = supervise_root(Context::background(), main).await {
        if let Some(child) = err.as_child() {
            println!(
                "tree stopped: {} (panic: {}) -> {}",
                child.task(),
                child.was_panic(),
                err.root_cause()
            );
        }
    }
    Ok(())
}
