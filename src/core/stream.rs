//! # Stream supervision.
//!
//! Tasks are admitted continuously from a [`TaskGen`] while the supervisor
//! runs: each one is bound, registered and launched immediately. Closing the
//! generator moves the supervisor into collecting the remaining reports; it
//! halts once they are all in. Error handling is the same as for any other
//! supervisor.

use std::sync::Arc;

use crate::core::supervisor::Supervisor;
use crate::tasks::TaskGen;

/// Supervisor admitting tasks from `source` until it closes.
///
/// # Example
/// ```rust
/// use treesup::{Context, TaskError, TaskFn, TaskGen, TaskRef, supervise_stream};
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() {
///     let (tx, source) = TaskGen::channel(8);
///     let pool = supervise_stream("pool", source);
///     let run = tokio::spawn({
///         let pool = pool.clone();
///         async move { pool.run(Context::background()).await }
///     });
///
///     for _ in 0..3 {
///         let job: TaskRef = TaskFn::arc(|_ctx: Context| async { Ok::<_, TaskError>(()) });
///         tx.send(job).await.unwrap();
///     }
///     drop(tx);
///     assert!(run.await.unwrap().is_ok());
/// }
/// ```
pub fn supervise_stream(name: impl Into<Arc<str>>, source: TaskGen) -> Supervisor {
    Supervisor::builder(name).with_source(source).build()
}
