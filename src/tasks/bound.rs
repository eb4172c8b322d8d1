//! # Bound tasks.
//!
//! Any [`Task`] handed to a supervisor is bound once, at submission time: its
//! name is sampled (or generated) and never changes afterwards.

use std::sync::Arc;

use crate::tasks::task::TaskRef;

/// A task together with its requested name.
///
/// Tasks that declare no name are named after the identity of their shared
/// handle, which is stable for the task's lifetime and unique among live tasks.
#[derive(Clone)]
pub(crate) struct BoundTask {
    task: TaskRef,
    name: Arc<str>,
}

impl BoundTask {
    pub(crate) fn bind(task: TaskRef) -> Self {
        let name = match task.name() {
            Some(name) => Arc::from(name),
            None => Arc::from(format!("{:p}", Arc::as_ptr(&task) as *const ())),
        };
        Self { task, name }
    }

    pub(crate) fn bind_as(task: TaskRef, name: &str) -> Self {
        Self {
            task,
            name: Arc::from(name),
        }
    }

    pub(crate) fn task(&self) -> &TaskRef {
        &self.task
    }

    pub(crate) fn name(&self) -> &Arc<str> {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Context;
    use crate::error::TaskError;
    use crate::tasks::TaskFn;

    #[test]
    fn declared_names_win() {
        let t: TaskRef = TaskFn::named_arc("alpha", |_ctx: Context| async { Ok::<_, TaskError>(()) });
        assert_eq!(&**BoundTask::bind(t).name(), "alpha");
    }

    #[test]
    fn unnamed_tasks_get_identity_names() {
        let a: TaskRef = TaskFn::arc(|_ctx: Context| async { Ok::<_, TaskError>(()) });
        let b: TaskRef = TaskFn::arc(|_ctx: Context| async { Ok::<_, TaskError>(()) });
        let ba = BoundTask::bind(a.clone());
        assert!(ba.name().starts_with("0x"));
        assert_eq!(ba.name(), BoundTask::bind(a).name());
        assert_ne!(ba.name(), BoundTask::bind(b).name());
    }
}
