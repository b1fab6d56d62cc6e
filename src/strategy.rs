// src/strategy.rs

//! Admission policies for consumers.
//!
//! A consumer asks its [`Strategy`] before starting each ready task; a `false`
//! verdict defers the task until some other accepted task ends. The bundled
//! policies cover the common cases: accept everything, cap the number of
//! running tasks, and cap running tasks per key (e.g. connections per host).
//!
//! Strategies are owned by exactly one consumer and are only ever called from
//! that consumer's manager, so they need no internal locking.
//!
//! Badly chosen limits can deadlock a run. If the tasks governed by one
//! strategy form a graph whose progress needs more simultaneously admitted
//! tasks than the strategy's lower bound allows, nothing further is admitted.
//! The loader does not detect this.

use std::collections::HashMap;
use std::hash::Hash;

use tracing::debug;

/// Decides whether a ready task may start now.
///
/// `info` is the value produced by the task's info function, or `None` if the
/// task has none. Verdicts must depend only on the set of currently accepted
/// tasks: the consumer may ask about the same task several times and expects
/// the same answer as long as no accepted task has started or ended in
/// between.
pub trait Strategy<I>: Send {
    /// Returns `true` to accept the task, recording it as running.
    fn start(&mut self, info: Option<&I>) -> bool;

    /// Called exactly once for every accepted task when its `load` returns,
    /// whether it succeeded or not.
    fn end(&mut self, info: Option<&I>);
}

impl<I, S: Strategy<I> + ?Sized> Strategy<I> for Box<S> {
    fn start(&mut self, info: Option<&I>) -> bool {
        (**self).start(info)
    }

    fn end(&mut self, info: Option<&I>) {
        (**self).end(info)
    }
}

/// Accepts every task. Used when a consumer is registered without a strategy.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysAccept;

impl<I> Strategy<I> for AlwaysAccept {
    fn start(&mut self, _info: Option<&I>) -> bool {
        true
    }

    fn end(&mut self, _info: Option<&I>) {}
}

/// Admits at most `limit` tasks at a time, regardless of info.
#[derive(Debug, Clone)]
pub struct MaxConcurrent {
    limit: usize,
    running: usize,
}

impl MaxConcurrent {
    pub fn new(limit: usize) -> Self {
        Self { limit, running: 0 }
    }

    pub fn running(&self) -> usize {
        self.running
    }
}

impl<I> Strategy<I> for MaxConcurrent {
    fn start(&mut self, _info: Option<&I>) -> bool {
        if self.running >= self.limit {
            return false;
        }
        self.running += 1;
        true
    }

    fn end(&mut self, _info: Option<&I>) {
        self.running = self.running.saturating_sub(1);
    }
}

/// Admits at most `limit` running tasks sharing the same info key, such as
/// concurrent connections to one host. Tasks without info are not limited.
#[derive(Debug, Clone)]
pub struct PerKeyLimit<K> {
    limit: usize,
    running: HashMap<K, usize>,
}

impl<K: Eq + Hash> PerKeyLimit<K> {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            running: HashMap::new(),
        }
    }

    pub fn running(&self, key: &K) -> usize {
        self.running.get(key).copied().unwrap_or(0)
    }
}

impl<K> Strategy<K> for PerKeyLimit<K>
where
    K: Eq + Hash + Clone + std::fmt::Debug + Send,
{
    fn start(&mut self, info: Option<&K>) -> bool {
        let Some(key) = info else {
            return true;
        };

        let count = self.running.entry(key.clone()).or_insert(0);
        if *count >= self.limit {
            debug!(?key, limit = self.limit, "temporarily delaying task; key at its limit");
            return false;
        }
        *count += 1;
        true
    }

    fn end(&mut self, info: Option<&K>) {
        let Some(key) = info else {
            return;
        };

        if let Some(count) = self.running.get_mut(key) {
            *count -= 1;
            if *count == 0 {
                self.running.remove(key);
            }
        }
    }
}
