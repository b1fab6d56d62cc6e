// src/engine/dispatch.rs

use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, trace};

use crate::consumer::Job;
use crate::errors::{LoaderError, Result};

use super::{ConsumerSlot, Loader};

impl<T, I> Loader<T, I>
where
    T: Clone + Send + 'static,
    I: Send + 'static,
{
    /// Hand every task on the pending frontier to its consumer, in the order
    /// the tasks became ready. Returns how many were dispatched.
    pub(super) fn dispatch_pending(&mut self) -> Result<usize> {
        let ready = self.dag.take_pending();
        for &idx in &ready {
            self.dispatch(idx)?;
        }
        Ok(ready.len())
    }

    fn dispatch(&mut self, idx: usize) -> Result<()> {
        let node = self.dag.node(idx);
        let consumer = node.consumer;
        let info = node.info.as_ref().map(|info| info());
        let load = Arc::clone(&node.load);

        let label = self.dag.identify(idx);
        let inputs = self.dag.take_inputs(idx);

        debug!(task = %label, idx, %consumer, inputs = inputs.len(), "dispatching task");

        let job = Job {
            idx,
            label,
            info,
            load,
            inputs,
        };

        if let ConsumerSlot::Sequential(c) = &mut self.consumers[consumer.index()] {
            c.push(job);
            return Ok(());
        }
        self.send_with_fallback(consumer.index(), job)
    }

    /// Send `job` to a parallel consumer without deadlocking against it.
    ///
    /// The consumer's manager may itself be blocked sending a completion on
    /// our full results channel, so while waiting for the task channel we
    /// keep receiving completions and buffer them for ingestion.
    fn send_with_fallback(&mut self, consumer: usize, job: Job<T, I>) -> Result<()> {
        let Self {
            consumers,
            runtime,
            results_rx,
            received,
            in_flight,
            ..
        } = self;

        let ConsumerSlot::Parallel(target) = &consumers[consumer] else {
            return Err(LoaderError::ConfigError(format!(
                "consumer#{consumer} is not a parallel consumer"
            )));
        };

        let job = match target.sender().try_send(job) {
            Ok(()) => {
                *in_flight += 1;
                return Ok(());
            }
            Err(TrySendError::Closed(_)) => return Err(LoaderError::ChannelClosed),
            Err(TrySendError::Full(job)) => job,
        };

        let runtime = runtime.as_ref().ok_or(LoaderError::Closed)?;
        let sender = target.sender().clone();
        let mut buffered = 0usize;

        let sent = runtime.block_on(async {
            let send = sender.send(job);
            tokio::pin!(send);

            loop {
                tokio::select! {
                    res = &mut send => return res.is_ok(),
                    Some(completion) = results_rx.recv() => {
                        received.push_back(completion);
                        buffered += 1;
                    }
                }
            }
        });

        *in_flight -= buffered;
        if buffered > 0 {
            trace!(consumer, buffered, "buffered completions while dispatching");
        }

        if !sent {
            return Err(LoaderError::ChannelClosed);
        }
        *in_flight += 1;
        Ok(())
    }
}
