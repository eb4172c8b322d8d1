//! # Task abstractions.
//!
//! This module provides the task-related types:
//! - [`Task`] - trait for implementing async cancelable tasks (optionally named)
//! - [`TaskFn`] - function-backed task implementation
//! - [`SteppedTask`] / [`Stepped`] - a step function repeated until cancelled
//! - [`TaskRef`] - shared reference to a task (`Arc<dyn Task>`)
//! - [`TaskGen`] - closable generator feeding a stream supervisor
//! - [`tasks_from_map`] - keyed work items turned into named tasks

mod bound;
mod generator;
mod stepped;
mod task;
mod task_fn;

pub(crate) use bound::BoundTask;
pub use generator::{TaskGen, tasks_from_map};
pub use stepped::{Stepped, SteppedTask};
pub use task::{Task, TaskRef};
pub use task_fn::TaskFn;
