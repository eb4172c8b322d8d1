//! # treesup
//!
//! **treesup** is a structured-concurrency supervision library for tokio.
//!
//! It organizes async tasks into trees: a supervisor launches children, fans
//! cancellation out to all of them as soon as one fails, waits for every child
//! to report and returns the first error. A supervisor is itself a task, so
//! trees nest without any extra glue.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │     Task     │   │     Task     │   │  Supervisor  │  (nested tree)
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            ▼ submit           ▼ submit           ▼ submit
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Supervisor                                                       │
//! │  - naming (collision strategy)       - error reactor              │
//! │  - control loop (sole owner of live set and phase)                │
//! │  - children context (one CancellationToken fan-out)               │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!        ▼                  ▼                  ▼
//!     ┌──────────┐       ┌──────────┐       ┌──────────┐
//!     │  worker  │       │  worker  │       │  worker  │  catch_unwind + sift
//!     └────┬─────┘       └────┬─────┘       └────┬─────┘
//!          └──────── Report (one channel) ───────┘──► control loop
//!                                                         │
//!                       Bus ◄── events ───────────────────┘──► SubscriberSet
//! ```
//!
//! ### Lifecycle
//! ```text
//! NotStarted ──run──► Running ──error──► WindingDown ──all reported──► Halted
//!                        │                    │
//!                        └─ AbortRapidly / quit_aggressively ─► Aborted
//! ```
//!
//! ## Features
//! | Area              | Description                                                 | Key types / functions                              |
//! |-------------------|-------------------------------------------------------------|----------------------------------------------------|
//! | **Supervision**   | Fork-join, streaming and pool supervisors, nested trees.    | [`Supervisor`], [`supervise_fork_join`], [`supervise_stream`], [`supervise_root`] |
//! | **Tasks**         | Plain, named and stepped tasks behind one trait.            | [`Task`], [`TaskFn`], [`Stepped`], [`TaskGen`]     |
//! | **Context**       | Cancellation, deadlines, "who am I / who supervises me".    | [`Context`]                                        |
//! | **Promise**       | Single-assignment future with five observation styles.      | [`Promise`], [`Resolver`]                          |
//! | **Policies**      | Naming, error reaction, warnings.                           | [`NameStrategy`], [`ErrorReactor`], [`WarningHandler`] |
//! | **Errors**        | Typed task errors with provenance.                          | [`TaskError`], [`ErrChild`], [`UsageError`]        |
//! | **Subscriber API**| Hook into supervision events.                               | [`Subscribe`], [`Event`]                           |
//!
//! ## Optional features
//! - `logging`: exports the built-in [`LogWriter`] subscriber (events as `tracing` records).
//!
//! ## Example
//! ```rust
//! use treesup::{Context, TaskError, TaskFn, TaskRef, supervise_fork_join, supervise_root};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), TaskError> {
//!     let fetch: TaskRef = TaskFn::named_arc("fetch", |ctx: Context| async move {
//!         println!("running as {}", ctx.task_path()); // "main/fetch"
//!         Ok::<_, TaskError>(())
//!     });
//!     let index: TaskRef = TaskFn::named_arc("index", |ctx: Context| async move {
//!         if let Some(err) = ctx.err() {
//!             return Err(err);
//!         }
//!         Ok::<_, TaskError>(())
//!     });
//!
//!     supervise_root(Context::background(), supervise_fork_join("main", vec![fetch, index])).await
//! }
//! ```
mod core;
mod error;
mod events;
mod promise;
mod subscribers;
mod tasks;

// ---- Public re-exports ----

pub use crate::core::{
    COLLISION_SUFFIX, Context, ErrorReactor, MAX_NAME_ATTEMPTS, NameStrategy, Phase, Reaction,
    SupervisedTask, SupervisionWarning, Supervisor, SupervisorBuilder, SupervisorConfig,
    TaskPhase, TaskReport, WILDCARD, WarningHandler, new_supervisor, supervise_fork_join,
    supervise_root, supervise_stream,
};
pub use crate::error::{ErrChild, TaskError, UsageError};
pub use crate::events::{Bus, Event, EventKind};
pub use crate::promise::{Promise, Resolver};
pub use crate::subscribers::{Subscribe, SubscriberSet};
pub use crate::tasks::{Stepped, SteppedTask, Task, TaskFn, TaskGen, TaskRef, tasks_from_map};

// Optional: expose a built-in tracing subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use crate::subscribers::LogWriter;
