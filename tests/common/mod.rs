#![allow(dead_code)]

use std::error::Error;
use std::sync::{Arc, Mutex};

pub use taskloader_test_utils::builders;
pub use taskloader_test_utils::events::EventLog;
pub use taskloader_test_utils::init_tracing;
pub use taskloader_test_utils::recording::{Call, RecordingStrategy, StrategyLog};

pub type TestResult = Result<(), Box<dyn Error>>;

/// Shared record of the inputs a test task was called with.
#[derive(Debug)]
pub struct Captured<T> {
    inner: Arc<Mutex<Vec<Vec<Option<T>>>>>,
}

impl<T> Clone for Captured<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone> Captured<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn push(&self, inputs: &[Option<T>]) {
        self.inner.lock().unwrap().push(inputs.to_vec());
    }

    /// Every input list seen, in call order.
    pub fn all(&self) -> Vec<Vec<Option<T>>> {
        self.inner.lock().unwrap().clone()
    }

    pub fn only(&self) -> Vec<Option<T>> {
        let all = self.all();
        assert_eq!(all.len(), 1, "expected exactly one call, got {}", all.len());
        all.into_iter().next().unwrap()
    }
}
