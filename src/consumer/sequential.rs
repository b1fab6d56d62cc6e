// src/consumer/sequential.rs

use std::collections::VecDeque;
use std::time::Instant;

use tracing::debug;

use crate::consumer::{Completion, Job};
use crate::strategy::Strategy;
use crate::types::ConsumerId;

/// Consumer with a concurrency of zero: tasks run on the caller's thread,
/// one at a time, inside `Loader::load` / `Loader::load_all`.
pub struct SequentialConsumer<T, I> {
    id: ConsumerId,
    strategy: Box<dyn Strategy<I>>,
    pending: VecDeque<Job<T, I>>,
}

impl<T, I> SequentialConsumer<T, I> {
    pub fn new(id: ConsumerId, strategy: Box<dyn Strategy<I>>) -> Self {
        Self {
            id,
            strategy,
            pending: VecDeque::new(),
        }
    }

    pub fn push(&mut self, job: Job<T, I>) {
        self.pending.push_back(job);
    }

    /// Tasks dispatched here but not yet run.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Remove and return the first pending task the strategy accepts.
    fn admit(&mut self) -> Option<Job<T, I>> {
        let pos = self
            .pending
            .iter()
            .position(|job| self.strategy.start(job.info.as_ref()))?;
        self.pending.remove(pos)
    }

    /// Run admitted tasks until the strategy defers everything left, the
    /// pending list is empty, or `deadline` has passed.
    ///
    /// The deadline is checked between tasks, never during one.
    pub fn step(&mut self, deadline: Option<Instant>) -> Vec<Completion<T>> {
        let mut completed = Vec::new();

        while let Some(job) = self.admit() {
            let finished = job.run();
            self.strategy.end(finished.info.as_ref());
            completed.push(finished.completion);

            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                break;
            }
        }

        if !self.pending.is_empty() && completed.is_empty() {
            debug!(
                consumer = %self.id,
                deferred = self.pending.len(),
                "strategy deferred every pending sequential task"
            );
        }

        completed
    }
}
