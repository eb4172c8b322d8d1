//! # Example: Streaming worker pool
//!
//! A producer feeds jobs into a [`TaskGen`] channel while the pool runs.
//! Each job is launched as soon as it arrives; names collide on purpose and
//! are resolved by the default suffix strategy. Dropping the sender closes
//! the stream and the pool halts once every job has reported.
//!
//! Run with: `cargo run --example stream_pool`

use std::time::Duration;

use treesup::{Context, TaskError, TaskFn, TaskGen, TaskRef, supervise_stream};

fn job(n: u64) -> TaskRef {
    TaskFn::named_arc("job", move |ctx: Context| async move {
        tokio::time::sleep(Duration::from_millis(50 * n)).await;
        println!("[{}] processed item {n}", ctx.task_path());
        Ok::<_, TaskError>(())
    })
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let (tx, source) = TaskGen::channel(4);
    let pool = supervise_stream("pool", source);
    let runner = tokio::spawn({
        let pool = pool.clone();
        async move { pool.run(Context::background()).await }
    });

    for n in 1..=6 {
        tx.send(job(n)).await?;
    }
    drop(tx);

    runner.await??;
    println!("pool finished: {:?}", pool.phase());
    Ok(())
}
