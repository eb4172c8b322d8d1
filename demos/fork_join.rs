//! # Example: Fork-join with a failing branch
//!
//! Three named jobs run under one supervisor. `compile` fails after a short
//! delay; its siblings observe cancellation, stop, and the supervisor returns
//! the first error tagged with the failing task's path.
//!
//! Events are written through the built-in `LogWriter` subscriber.
//!
//! Run with: `cargo run --example fork_join --features logging`

use std::{sync::Arc, time::Duration};

use treesup::{
    Context, LogWriter, Subscribe, Supervisor, TaskError, TaskFn, TaskRef, supervise_root,
};

fn job(name: &'static str, work: Duration, fail: bool) -> TaskRef {
    TaskFn::named_arc(name, move |ctx: Context| async move {
        println!("[{}] start", ctx.task_path());
        tokio::select! {
            _ = ctx.cancelled() => {
                println!("[{}] cancelled", ctx.task_path());
                Err(TaskError::Canceled)
            }
            _ = tokio::time::sleep(work) => {
                if fail {
                    return Err(TaskError::fail("exit status 2"));
                }
                println!("[{}] done", ctx.task_path());
                Ok(())
            }
        }
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

    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let build = Supervisor::builder("build")
        .with_subscribers(subs)
        .with_tasks(vec![
            job("fetch", Duration::from_millis(100), false),
            job("compile", Duration::from_millis(200), true),
            job("package", Duration::from_secs(5), false),
        ])
        .build();

    match supervise_root(Context::background(), build).await {
        Ok(()) => println!("build succeeded"),
        Err(err) => {
            let origin = err.as_child().map(|c| c.task()).unwrap_or("<unknown>");
            println!("build failed in {origin}: {}", err.root_cause());
        }
    }
    Ok(())
}
