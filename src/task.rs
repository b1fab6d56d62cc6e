// src/task.rs

//! User-facing description of a unit of work.
//!
//! A [`Task`] is declared as a tree: `requires_direct` nests sub-tasks inline,
//! while `requires_named` refers back to tasks declared earlier in the same
//! scope (see [`crate::dag::Scope`]). The tree is flattened into the DAG when
//! it is handed to `Loader::add`.

use std::fmt;
use std::sync::Arc;

use crate::errors::TaskError;
use crate::types::ConsumerId;

/// Performs a task given the ordered results of its prerequisites.
///
/// Inputs are the results of `requires_named` (declaration order) followed by
/// the results of `requires_direct` (declaration order). A `None` input means
/// that prerequisite failed.
pub type LoadFn<T> = Arc<dyn Fn(Vec<Option<T>>) -> anyhow::Result<T> + Send + Sync>;

/// Releases a result that the loader no longer needs.
pub type FreeFn<T> = Arc<dyn Fn(T) + Send + Sync>;

/// Produces the value a consumer's strategy uses to admit or defer a task.
pub type InfoFn<I> = Arc<dyn Fn() -> I + Send + Sync>;

pub struct Task<T, I = String> {
    pub(crate) name: Option<String>,
    pub(crate) keep: bool,
    pub(crate) load: LoadFn<T>,
    pub(crate) free: Option<FreeFn<T>>,
    pub(crate) requires_named: Vec<String>,
    pub(crate) requires_direct: Vec<Task<T, I>>,
    pub(crate) consumer: ConsumerId,
    pub(crate) info: Option<InfoFn<I>>,
    /// Set by [`Task::named`]; the target name of a passthrough.
    passthrough: Option<String>,
}

impl<T, I> Task<T, I> {
    pub fn new<F>(load: F) -> Self
    where
        F: Fn(Vec<Option<T>>) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        Self {
            name: None,
            keep: false,
            load: Arc::new(load),
            free: None,
            requires_named: Vec::new(),
            requires_direct: Vec::new(),
            consumer: ConsumerId::SEQUENTIAL,
            info: None,
            passthrough: None,
        }
    }

    /// Name used to reference this task from later siblings and from its own
    /// sub-tasks, and to retrieve its result when kept.
    ///
    /// An empty name is the same as no name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.name = (!name.is_empty()).then_some(name);
        self
    }

    /// Retain the result under the task's name for `Loader::result`.
    ///
    /// Kept names must be unique across the lifetime of the loader.
    pub fn keep(mut self, keep: bool) -> Self {
        self.keep = keep;
        self
    }

    pub fn free<F>(mut self, free: F) -> Self
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        self.free = Some(Arc::new(free));
        self
    }

    /// Depend on a task declared earlier in scope.
    pub fn require(mut self, name: impl Into<String>) -> Self {
        self.requires_named.push(name.into());
        self
    }

    pub fn requires_named<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.requires_named.extend(names.into_iter().map(Into::into));
        self
    }

    /// Depend on an inline sub-task. Sub-tasks open a new naming scope.
    pub fn subtask(mut self, task: Task<T, I>) -> Self {
        self.requires_direct.push(task);
        self
    }

    pub fn requires_direct(mut self, tasks: impl IntoIterator<Item = Task<T, I>>) -> Self {
        self.requires_direct.extend(tasks);
        self
    }

    pub fn consumer(mut self, consumer: ConsumerId) -> Self {
        self.consumer = consumer;
        self
    }

    /// Strategy info. Must return the same value every time it is called.
    pub fn info<F>(mut self, info: F) -> Self
    where
        F: Fn() -> I + Send + Sync + 'static,
    {
        self.info = Some(Arc::new(info));
        self
    }

    /// Target of an unmodified passthrough, which the DAG replaces by a direct
    /// edge to the named task instead of allocating a node for it.
    pub(crate) fn plain_passthrough(&self) -> Option<&str> {
        let plain = self.name.is_none()
            && !self.keep
            && self.free.is_none()
            && self.info.is_none()
            && self.requires_named.len() == 1
            && self.requires_direct.is_empty();

        if plain { self.passthrough.as_deref() } else { None }
    }
}

impl<T: Send + 'static, I> Task<T, I> {
    /// A sub-task that resolves the task called `name` in the enclosing scope
    /// and forwards its result, for use where only sub-tasks are accepted.
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        let target = name.clone();

        let mut task = Task::new(move |inputs: Vec<Option<T>>| {
            inputs
                .into_iter()
                .next()
                .flatten()
                .ok_or_else(|| TaskError::UpstreamFailed(target.clone()).into())
        })
        .require(name.clone());
        task.passthrough = Some(name);
        task
    }
}

impl<T, I> Clone for Task<T, I> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            keep: self.keep,
            load: Arc::clone(&self.load),
            free: self.free.clone(),
            requires_named: self.requires_named.clone(),
            requires_direct: self.requires_direct.clone(),
            consumer: self.consumer,
            info: self.info.clone(),
            passthrough: self.passthrough.clone(),
        }
    }
}

impl<T, I> fmt::Debug for Task<T, I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("keep", &self.keep)
            .field("requires_named", &self.requires_named)
            .field("requires_direct", &self.requires_direct)
            .field("consumer", &self.consumer)
            .field("passthrough", &self.passthrough)
            .finish_non_exhaustive()
    }
}
