// src/engine/run.rs

use std::time::{Duration, Instant};

use tokio::sync::mpsc::error::TryRecvError;
use tracing::{debug, trace};

use crate::errors::{LoaderError, Result};
use crate::types::Progress;

use super::{ConsumerSlot, Loader};

impl<T, I> Loader<T, I>
where
    T: Clone + Send + 'static,
    I: Send + 'static,
{
    /// Make as much progress as possible within `budget`.
    ///
    /// Dispatches ready tasks, runs sequential consumers on this thread and
    /// ingests whatever parallel consumers have finished, without waiting for
    /// them. Returns early once nothing more can happen in this slice. The
    /// budget is checked between tasks, so a slow sequential `load` can
    /// overrun it by its own duration.
    pub fn load(&mut self, budget: Duration) -> Result<Progress> {
        self.ensure_open()?;

        let mut duplicate = None;

        self.dispatch_pending()?;
        // The budget covers running tasks, not handing out the initial frontier.
        let deadline = Instant::now() + budget;

        loop {
            let stepped = self.step_sequential(Some(deadline));
            let polled = self.poll_results()?;
            let ingested = self.ingest_received(&mut duplicate);
            self.dispatch_pending()?;

            trace!(stepped, polled, ingested, "load iteration");

            if ingested == 0 || Instant::now() >= deadline {
                break;
            }
        }

        self.finish(duplicate)
    }

    /// Run until every task added so far has completed.
    ///
    /// Blocks on the completion channel whenever only parallel consumers can
    /// make progress. Fails with [`LoaderError::Stalled`] if tasks remain but
    /// nothing is running and every pending task is deferred by its strategy.
    pub fn load_all(&mut self) -> Result<Progress> {
        self.ensure_open()?;

        let mut duplicate = None;

        loop {
            self.dispatch_pending()?;
            self.step_sequential(None);
            self.poll_results()?;
            let ingested = self.ingest_received(&mut duplicate);
            self.dispatch_pending()?;

            if self.progress.remaining == 0 {
                break;
            }

            if ingested > 0 {
                continue;
            }

            if self.in_flight == 0 {
                debug!(remaining = self.progress.remaining, "load_all stalled");
                return Err(LoaderError::Stalled {
                    remaining: self.progress.remaining,
                });
            }

            self.wait_for_result()?;
        }

        self.finish(duplicate)
    }

    fn finish(&mut self, duplicate: Option<LoaderError>) -> Result<Progress> {
        self.progress.done = self.progress.remaining == 0;

        match duplicate {
            Some(err) => Err(err),
            None => Ok(self.progress),
        }
    }

    /// Advance every sequential consumer once. Returns the number of tasks run.
    fn step_sequential(&mut self, deadline: Option<Instant>) -> usize {
        let mut stepped = 0;

        for slot in self.consumers.iter_mut() {
            // At least one task runs per slice, however small the budget.
            if stepped > 0 && deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                break;
            }

            if let ConsumerSlot::Sequential(consumer) = slot {
                if consumer.pending_len() == 0 {
                    continue;
                }

                let completions = consumer.step(deadline);
                stepped += completions.len();
                self.received.extend(completions);
            }
        }

        stepped
    }

    /// Buffer every completion already waiting on the channel.
    fn poll_results(&mut self) -> Result<usize> {
        let mut polled = 0;

        loop {
            match self.results_rx.try_recv() {
                Ok(completion) => {
                    self.in_flight -= 1;
                    self.received.push_back(completion);
                    polled += 1;
                }
                Err(TryRecvError::Empty) => return Ok(polled),
                Err(TryRecvError::Disconnected) => return Err(LoaderError::ChannelClosed),
            }
        }
    }

    fn wait_for_result(&mut self) -> Result<()> {
        let runtime = self.runtime.as_ref().ok_or(LoaderError::Closed)?;

        trace!(in_flight = self.in_flight, "waiting for a completion");

        match runtime.block_on(self.results_rx.recv()) {
            Some(completion) => {
                self.in_flight -= 1;
                self.received.push_back(completion);
                Ok(())
            }
            None => Err(LoaderError::ChannelClosed),
        }
    }
}
