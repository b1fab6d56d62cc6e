// src/consumer/mod.rs

//! Consumers run dispatched tasks under the control of a strategy.
//!
//! - [`sequential`] runs tasks on the thread that calls `Loader::load` /
//!   `Loader::load_all`, and only while that call is in progress.
//! - [`parallel`] owns a manager task plus a fixed pool of worker threads
//!   that run continuously, reporting completions over a channel.
//!
//! Both keep dispatched tasks in a FIFO `pending` list and promote the first
//! one the strategy accepts.

pub mod parallel;
pub mod sequential;

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use tracing::{trace, warn};

use crate::errors::TaskError;
use crate::task::LoadFn;

pub use parallel::ParallelConsumer;
pub use sequential::SequentialConsumer;

/// A ready task as handed to a consumer: its `load` function, its assembled
/// input, and its strategy info.
pub struct Job<T, I> {
    pub idx: usize,
    /// Human-readable task path, for logs.
    pub label: String,
    pub info: Option<I>,
    pub load: LoadFn<T>,
    pub inputs: Vec<Option<T>>,
}

/// Outcome of one task, reported back to the loader.
#[derive(Debug)]
pub struct Completion<T> {
    pub idx: usize,
    pub outcome: Result<T, TaskError>,
}

/// A completion plus the info its consumer needs to close the strategy's books.
pub struct Finished<T, I> {
    pub completion: Completion<T>,
    pub info: Option<I>,
}

impl<T, I> Job<T, I> {
    /// Call `load`, converting a panic into a task error.
    pub fn run(self) -> Finished<T, I> {
        let Job {
            idx,
            label,
            info,
            load,
            inputs,
        } = self;

        trace!(task = %label, idx, inputs = inputs.len(), "running task");

        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| load(inputs))) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => {
                warn!(task = %label, idx, error = %format!("{err:#}"), "task failed");
                // Passthroughs report their own error kind through anyhow.
                match err.downcast::<TaskError>() {
                    Ok(err) => Err(err),
                    Err(err) => Err(TaskError::Failed(err)),
                }
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!(task = %label, idx, panic = %message, "task panicked");
                Err(TaskError::Panicked(message))
            }
        };

        Finished {
            completion: Completion { idx, outcome },
            info,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "<non-string panic payload>".to_string()
    }
}
