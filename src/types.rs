// src/types.rs

use std::fmt;

/// Opaque handle for a consumer registered with a [`crate::Loader`].
///
/// `ConsumerId::SEQUENTIAL` (the default) is the built-in consumer that runs
/// tasks one at a time on the thread calling `load` / `load_all`, with a
/// strategy that accepts everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ConsumerId(pub(crate) usize);

impl ConsumerId {
    pub const SEQUENTIAL: ConsumerId = ConsumerId(0);

    pub(crate) fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ConsumerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "consumer#{}", self.0)
    }
}

/// Snapshot returned by `load` / `load_all`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Progress {
    /// Tasks whose `load` has returned and whose completion has been ingested.
    pub completed: usize,
    /// Tasks added but not yet completed.
    pub remaining: usize,
    /// `remaining == 0` as of the end of the call.
    pub done: bool,
}

impl Progress {
    /// Total number of tasks added so far.
    pub fn total(&self) -> usize {
        self.completed + self.remaining
    }

    /// Completed fraction in `0.0..=1.0`; an empty loader counts as finished.
    pub fn fraction(&self) -> f64 {
        match self.total() {
            0 => 1.0,
            total => self.completed as f64 / total as f64,
        }
    }
}
