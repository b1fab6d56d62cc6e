// src/dag/graph.rs

use tracing::{debug, trace};

use crate::dag::scope::Scope;
use crate::errors::{LoaderError, Result};
use crate::task::{FreeFn, InfoFn, LoadFn, Task};
use crate::types::ConsumerId;

/// A flattened task: everything from [`Task`] except its dependency lists,
/// which live in the [`Dag`] edge arrays.
pub struct Node<T, I> {
    pub name: Option<String>,
    pub keep: bool,
    pub consumer: ConsumerId,
    pub parent: Option<usize>,
    pub(crate) load: LoadFn<T>,
    pub(crate) free: Option<FreeFn<T>>,
    pub(crate) info: Option<InfoFn<I>>,
}

/// Directed acyclic graph of tasks, made up of disconnected subgraphs.
///
/// Every per-task array is indexed by the dense task identity handed out in
/// declaration order. Acyclicity holds by construction: a named requirement
/// must resolve to a task already in scope, and sub-tasks only point
/// downwards.
pub struct Dag<T, I> {
    nodes: Vec<Node<T, I>>,

    /// Prerequisites not yet completed. Emptied as completions arrive.
    requires: Vec<Vec<usize>>,

    /// Successors waiting on this task. Cut when the task completes.
    required_by: Vec<Vec<usize>>,

    /// Ordered prerequisites whose results form the task's `load` input.
    /// Never mutated after construction.
    result_requires: Vec<Vec<usize>>,

    /// Successors that have not yet collected this task's result.
    result_required_by: Vec<Vec<usize>>,

    /// `None` until completion, and also `None` on failure or once released.
    results: Vec<Option<T>>,

    /// Ready tasks not yet dispatched.
    pending: Vec<usize>,
}

impl<T, I> Default for Dag<T, I> {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            requires: Vec::new(),
            required_by: Vec::new(),
            result_requires: Vec::new(),
            result_required_by: Vec::new(),
            results: Vec::new(),
            pending: Vec::new(),
        }
    }
}

impl<T, I> Dag<T, I> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, idx: usize) -> &Node<T, I> {
        &self.nodes[idx]
    }

    pub fn name(&self, idx: usize) -> Option<&str> {
        self.nodes[idx].name.as_deref()
    }

    pub fn pending(&self) -> &[usize] {
        &self.pending
    }

    pub fn requires(&self, idx: usize) -> &[usize] {
        &self.requires[idx]
    }

    pub fn required_by(&self, idx: usize) -> &[usize] {
        &self.required_by[idx]
    }

    pub fn result_requires(&self, idx: usize) -> &[usize] {
        &self.result_requires[idx]
    }

    pub fn result(&self, idx: usize) -> Option<&T> {
        self.results[idx].as_ref()
    }

    /// True if the task has no outstanding prerequisites.
    pub fn is_ready(&self, idx: usize) -> bool {
        self.requires[idx].is_empty()
    }

    /// Drain the pending frontier, in the order tasks became ready.
    pub fn take_pending(&mut self) -> Vec<usize> {
        std::mem::take(&mut self.pending)
    }

    /// Flatten a task list into the graph, resolving names in a fresh scope.
    ///
    /// `consumers` is the number of registered consumers; a task naming any
    /// other consumer is rejected. On error the graph is restored to its state
    /// before the call. Returns the number of nodes added, which excludes
    /// passthroughs replaced by direct edges.
    pub fn add(&mut self, tasks: Vec<Task<T, I>>, consumers: usize) -> Result<usize> {
        let mark = self.nodes.len();
        let pending_mark = self.pending.len();

        match self.add_tasks(tasks, None, &Scope::new(), consumers) {
            Ok(()) => {
                debug!(added = self.nodes.len() - mark, total = self.nodes.len(), "tasks added to DAG");
                Ok(self.nodes.len() - mark)
            }
            Err(err) => {
                self.rollback(mark, pending_mark);
                Err(err)
            }
        }
    }

    fn add_tasks(
        &mut self,
        tasks: Vec<Task<T, I>>,
        parent: Option<usize>,
        scope: &Scope,
        consumers: usize,
    ) -> Result<()> {
        let mut scope = scope.clone();

        for task in tasks {
            if let Some(target) = task.plain_passthrough() {
                let dep = self.resolve(&scope, target, parent)?;
                if let Some(parent) = parent {
                    self.add_edge(parent, dep);
                }
                continue;
            }

            let Task {
                name,
                keep,
                load,
                free,
                requires_named,
                requires_direct,
                consumer,
                info,
                ..
            } = task;

            let idx = self.push_node(Node {
                name,
                keep,
                consumer,
                parent,
                load,
                free,
                info,
            });

            if keep && self.nodes[idx].name.is_none() {
                return Err(LoaderError::KeepWithoutName {
                    task: self.identify(idx),
                });
            }

            if consumer.index() >= consumers {
                return Err(LoaderError::UnknownConsumer {
                    task: self.identify(idx),
                    consumer,
                });
            }

            if let Some(parent) = parent {
                self.add_edge(parent, idx);
            }

            // Named requirements see the scope as it was before this task, so
            // a task can depend on an earlier homonym but never on itself.
            for named in &requires_named {
                let dep = self.resolve(&scope, named, Some(idx))?;
                self.add_edge(idx, dep);
            }

            if let Some(name) = &self.nodes[idx].name {
                scope.insert(name.clone(), idx);
            }

            if !requires_direct.is_empty() {
                self.add_tasks(requires_direct, Some(idx), &scope, consumers)?;
            }

            if self.is_ready(idx) {
                self.pending.push(idx);
            }
        }

        Ok(())
    }

    fn push_node(&mut self, node: Node<T, I>) -> usize {
        self.nodes.push(node);
        self.requires.push(Vec::new());
        self.required_by.push(Vec::new());
        self.result_requires.push(Vec::new());
        self.result_required_by.push(Vec::new());
        self.results.push(None);
        self.nodes.len() - 1
    }

    /// Resolve `name` for `requester`, refusing anything that would close a
    /// cycle through the requester's own ancestry.
    fn resolve(&self, scope: &Scope, name: &str, requester: Option<usize>) -> Result<usize> {
        let Some(dep) = scope.get(name) else {
            return Err(LoaderError::NameNotInScope {
                name: name.to_string(),
                task: self.describe(requester),
            });
        };

        let mut cursor = requester;
        while let Some(idx) = cursor {
            if idx == dep {
                return Err(LoaderError::AncestorReference {
                    name: name.to_string(),
                    task: self.describe(requester),
                });
            }
            cursor = self.nodes[idx].parent;
        }

        trace!(name, dep, %scope, "resolved named requirement");
        Ok(dep)
    }

    fn describe(&self, idx: Option<usize>) -> String {
        match idx {
            Some(idx) => self.identify(idx),
            None => "<top level>".to_string(),
        }
    }

    /// `a` requires `b`, and requires the result of `b`.
    fn add_edge(&mut self, a: usize, b: usize) {
        self.requires[a].push(b);
        self.required_by[b].push(a);
        self.result_requires[a].push(b);
        self.result_required_by[b].push(a);
    }

    // Edges created by one `add` only join nodes created by that same call,
    // so truncating every array is a complete undo.
    fn rollback(&mut self, mark: usize, pending_mark: usize) {
        debug!(discarded = self.nodes.len() - mark, "rolling back failed add");
        self.nodes.truncate(mark);
        self.requires.truncate(mark);
        self.required_by.truncate(mark);
        self.result_requires.truncate(mark);
        self.result_required_by.truncate(mark);
        self.results.truncate(mark);
        self.pending.truncate(pending_mark);
    }

    /// Store the result of a completed task and cut its edges to successors.
    ///
    /// Successors left with no outstanding prerequisites join the pending
    /// frontier; they are also returned. A task that no successor reads from
    /// is released immediately.
    pub fn complete(&mut self, idx: usize, result: Option<T>) -> Vec<usize> {
        self.results[idx] = result;

        let successors = std::mem::take(&mut self.required_by[idx]);
        let mut ready = Vec::new();

        // A successor may list the same prerequisite twice (named and as a
        // passthrough); it only becomes ready when the last entry goes.
        for succ in successors {
            let requires = &mut self.requires[succ];
            if let Some(pos) = requires.iter().position(|&dep| dep == idx) {
                requires.swap_remove(pos);
                if requires.is_empty() {
                    self.pending.push(succ);
                    ready.push(succ);
                }
            }
        }

        if self.result_required_by[idx].is_empty() {
            self.release(idx);
        }

        ready
    }

    /// Drop a stored result, handing it to the task's finalizer unless the
    /// task is kept (the kept copy is owned by the loader's results table).
    pub fn release(&mut self, idx: usize) {
        let Some(value) = self.results[idx].take() else {
            return;
        };

        let node = &self.nodes[idx];
        if let (Some(free), false) = (&node.free, node.keep) {
            trace!(idx, "releasing task result");
            free(value);
        }
    }

    /// Release every result still held, e.g. on shutdown.
    pub fn release_all(&mut self) {
        for idx in 0..self.nodes.len() {
            self.release(idx);
        }
    }
}

impl<T: Clone, I> Dag<T, I> {
    /// The ordered `load` input of `idx`, read from the stored results.
    pub fn inputs(&self, idx: usize) -> Vec<Option<T>> {
        self.result_requires[idx]
            .iter()
            .map(|&dep| self.results[dep].clone())
            .collect()
    }

    /// Assemble the input of `idx` for dispatch, releasing any prerequisite
    /// result that no other successor still has to collect.
    pub fn take_inputs(&mut self, idx: usize) -> Vec<Option<T>> {
        let inputs = self.inputs(idx);

        for pos in 0..self.result_requires[idx].len() {
            let dep = self.result_requires[idx][pos];
            let readers = &mut self.result_required_by[dep];
            if let Some(at) = readers.iter().position(|&r| r == idx) {
                readers.swap_remove(at);
                if readers.is_empty() {
                    self.release(dep);
                }
            }
        }

        inputs
    }
}
