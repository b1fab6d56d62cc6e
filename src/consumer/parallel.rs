// src/consumer/parallel.rs

//! Concurrent consumer: one manager task plus `concurrency` worker threads.
//!
//! The manager waits on three inputs at once: a task dispatched by the
//! loader, a completion from one of its workers, or shutdown. After each
//! event it promotes the first pending task the strategy accepts and hands
//! admitted tasks to free workers.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace};

use crate::consumer::{Completion, Finished, Job};
use crate::strategy::Strategy;
use crate::types::ConsumerId;

/// Loader-side handle of a running parallel consumer.
pub struct ParallelConsumer<T, I> {
    id: ConsumerId,
    concurrency: usize,
    tasks: mpsc::Sender<Job<T, I>>,
    manager: JoinHandle<()>,
}

impl<T, I> ParallelConsumer<T, I>
where
    T: Send + 'static,
    I: Send + 'static,
{
    /// Start the manager and its workers on `runtime`.
    ///
    /// Completions are relayed to `results`; the consumer stops when
    /// `shutdown` changes or when the returned handle is dropped.
    pub fn spawn(
        runtime: &Handle,
        id: ConsumerId,
        concurrency: usize,
        strategy: Box<dyn Strategy<I>>,
        results: mpsc::Sender<Completion<T>>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        // Unbuffered in spirit: the loader hands over one task at a time and
        // drains completions while it waits.
        let (tasks_tx, tasks_rx) = mpsc::channel::<Job<T, I>>(1);
        let (workers_tx, workers_rx) = mpsc::channel::<Job<T, I>>(concurrency);
        let (finished_tx, finished_rx) = mpsc::channel::<Finished<T, I>>(concurrency);

        let workers_rx = Arc::new(Mutex::new(workers_rx));
        for worker in 1..=concurrency {
            let jobs = Arc::clone(&workers_rx);
            let finished = finished_tx.clone();
            runtime.spawn_blocking(move || run_worker(id, worker, jobs, finished));
        }

        let manager = Manager {
            id,
            strategy,
            pending: VecDeque::new(),
            current: None,
            available: concurrency,
            tasks: tasks_rx,
            workers: workers_tx,
            finished: finished_rx,
            results,
            shutdown,
        };

        info!(consumer = %id, concurrency, "parallel consumer started");

        Self {
            id,
            concurrency,
            tasks: tasks_tx,
            manager: runtime.spawn(manager.run()),
        }
    }
}

impl<T, I> ParallelConsumer<T, I> {
    pub fn id(&self) -> ConsumerId {
        self.id
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Channel the loader dispatches tasks on.
    pub fn sender(&self) -> &mpsc::Sender<Job<T, I>> {
        &self.tasks
    }

    /// Give up the dispatch channel and return the manager's join handle.
    pub fn into_manager(self) -> JoinHandle<()> {
        self.manager
    }
}

struct Manager<T, I> {
    id: ConsumerId,
    strategy: Box<dyn Strategy<I>>,
    /// Dispatched but not yet accepted by the strategy.
    pending: VecDeque<Job<T, I>>,
    /// Accepted by the strategy, waiting for a free worker.
    current: Option<Job<T, I>>,
    available: usize,
    tasks: mpsc::Receiver<Job<T, I>>,
    workers: mpsc::Sender<Job<T, I>>,
    finished: mpsc::Receiver<Finished<T, I>>,
    results: mpsc::Sender<Completion<T>>,
    shutdown: watch::Receiver<bool>,
}

impl<T, I> Manager<T, I>
where
    T: Send + 'static,
    I: Send + 'static,
{
    async fn run(mut self) {
        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.changed() => {
                    debug!(consumer = %self.id, "shutdown requested");
                    break;
                }

                job = self.tasks.recv() => match job {
                    Some(job) => {
                        trace!(consumer = %self.id, task = %job.label, "task received");
                        self.pending.push_back(job);
                    }
                    None => break,
                },

                Some(finished) = self.finished.recv() => {
                    self.strategy.end(finished.info.as_ref());
                    self.available += 1;

                    // A full results channel parks us here; the loader keeps
                    // draining it while it dispatches.
                    if self.results.send(finished.completion).await.is_err() {
                        break;
                    }
                }
            }

            if self.hand_out().await.is_err() {
                break;
            }
        }

        debug!(
            consumer = %self.id,
            abandoned = self.pending.len() + usize::from(self.current.is_some()),
            "parallel consumer manager stopped"
        );
    }

    /// Promote accepted tasks and give them to free workers.
    async fn hand_out(&mut self) -> Result<(), mpsc::error::SendError<Job<T, I>>> {
        loop {
            if self.current.is_none() {
                self.current = self.admit();
            }

            if self.available == 0 {
                return Ok(());
            }

            let Some(job) = self.current.take() else {
                if !self.pending.is_empty() {
                    trace!(
                        consumer = %self.id,
                        deferred = self.pending.len(),
                        "strategy deferred every pending task"
                    );
                }
                return Ok(());
            };

            // A worker is free, so this only waits for it to reach `recv`.
            self.workers.send(job).await?;
            self.available -= 1;
        }
    }

    fn admit(&mut self) -> Option<Job<T, I>> {
        let pos = self
            .pending
            .iter()
            .position(|job| self.strategy.start(job.info.as_ref()))?;
        self.pending.remove(pos)
    }
}

fn run_worker<T, I>(
    consumer: ConsumerId,
    worker: usize,
    jobs: Arc<Mutex<mpsc::Receiver<Job<T, I>>>>,
    finished: mpsc::Sender<Finished<T, I>>,
) {
    loop {
        let job = {
            let mut jobs = match jobs.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            jobs.blocking_recv()
        };

        let Some(job) = job else {
            break;
        };

        trace!(%consumer, worker, task = %job.label, "worker picked up task");

        if finished.blocking_send(job.run()).is_err() {
            break;
        }
    }

    trace!(%consumer, worker, "worker stopped");
}
