//! Runtime core: supervision trees.
//!
//! Public API: [`Supervisor`] and its builder/config, [`Context`], the
//! [`SupervisedTask`] handle, naming and reaction policies, and the engine
//! constructors ([`supervise_fork_join`], [`supervise_stream`],
//! [`supervise_root`], [`new_supervisor`]).
//!
//! Internal modules:
//! - `control`: the per-supervisor control loop (phase machine);
//! - `worker`: launches one child with panic recovery and reports it;
//! - `publisher`: scoped event publishing and the subscriber listener.

mod builder;
mod config;
mod context;
mod control;
mod forkjoin;
mod naming;
mod publisher;
mod reaction;
mod root;
mod stream;
mod supervised;
mod supervisor;
mod worker;

pub use builder::SupervisorBuilder;
pub use config::SupervisorConfig;
pub use context::Context;
pub use forkjoin::supervise_fork_join;
pub use naming::{COLLISION_SUFFIX, MAX_NAME_ATTEMPTS, NameStrategy, WILDCARD};
pub use reaction::{ErrorReactor, Reaction, SupervisionWarning, WarningHandler};
pub use root::{new_supervisor, supervise_root};
pub use stream::supervise_stream;
pub use supervised::{SupervisedTask, TaskPhase, TaskReport};
pub use supervisor::{Phase, Supervisor};
