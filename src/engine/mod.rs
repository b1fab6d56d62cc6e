// src/engine/mod.rs

//! The loader: owns the DAG, the registered consumers, the kept-results
//! table and the completion channel.
//!
//! Nothing happens outside of [`Loader::load`] and [`Loader::load_all`]
//! except on parallel consumers, whose workers keep running tasks that were
//! already dispatched to them.
//!
//! - [`dispatch`] hands ready tasks to their consumers.
//! - [`ingest`] stores completions and relaxes successor edges.
//! - [`run`] implements the time-sliced and blocking loops.
//!
//! The loader drives an internal Tokio runtime with `block_on`, so its
//! methods must be called from synchronous code, not from inside an async
//! task.

mod dispatch;
mod ingest;
mod run;

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt::Debug;
use std::hash::Hash;
use std::time::Duration;

use tokio::runtime::Runtime;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::config::LoaderConfig;
use crate::consumer::{Completion, ParallelConsumer, SequentialConsumer};
use crate::dag::Dag;
use crate::errors::{LoaderError, Result, TaskError};
use crate::strategy::{AlwaysAccept, Strategy};
use crate::task::Task;
use crate::types::{ConsumerId, Progress};

enum ConsumerSlot<T, I> {
    Sequential(SequentialConsumer<T, I>),
    Parallel(ParallelConsumer<T, I>),
}

/// Concurrent task loader.
///
/// ```no_run
/// use std::time::Duration;
/// use taskloader::{Loader, Task};
///
/// let mut loader: Loader<String> = Loader::new();
/// loader.add(vec![
///     Task::new(|_| Ok("a".to_string())).name("a"),
///     Task::new(|inputs: Vec<Option<String>>| Ok(format!("{}b", inputs[0].clone().unwrap_or_default())))
///         .name("b")
///         .keep(true)
///         .require("a"),
/// ])?;
///
/// while !loader.load(Duration::from_millis(16))?.done {}
/// assert_eq!(loader.result_value("b").map(String::as_str), Some("ab"));
/// # Ok::<(), taskloader::LoaderError>(())
/// ```
pub struct Loader<T, I = String> {
    dag: Dag<T, I>,
    consumers: Vec<ConsumerSlot<T, I>>,
    kept: HashMap<String, std::result::Result<T, TaskError>>,
    progress: Progress,

    /// Completions pulled off the channel (or produced by sequential
    /// consumers) that have not been ingested yet.
    received: VecDeque<Completion<T>>,
    /// Tasks handed to parallel consumers whose completion has not been
    /// received yet.
    in_flight: usize,
    results_tx: mpsc::Sender<Completion<T>>,
    results_rx: mpsc::Receiver<Completion<T>>,

    shutdown: watch::Sender<bool>,
    /// Built when the first parallel consumer registers.
    runtime: Option<Runtime>,
    runtime_threads: usize,
    max_worker_threads: usize,
    shutdown_timeout: Duration,
    closed: bool,
}

impl<T, I> Loader<T, I>
where
    T: Clone + Send + 'static,
    I: Send + 'static,
{
    /// Empty loader with the default configuration and the built-in
    /// sequential consumer ([`ConsumerId::SEQUENTIAL`]).
    pub fn new() -> Self {
        Self::with_config(&LoaderConfig::default())
    }

    /// Empty loader using the global settings of `config`.
    ///
    /// Consumers listed in the config are not registered; see
    /// [`Loader::register_consumers`].
    pub fn with_config(config: &LoaderConfig) -> Self {
        let (results_tx, results_rx) = mpsc::channel(config.result_buffer.max(1));
        let (shutdown, _) = watch::channel(false);

        let sequential = SequentialConsumer::new(ConsumerId::SEQUENTIAL, Box::new(AlwaysAccept));

        Self {
            dag: Dag::new(),
            consumers: vec![ConsumerSlot::Sequential(sequential)],
            kept: HashMap::new(),
            progress: Progress {
                done: true,
                ..Progress::default()
            },
            received: VecDeque::new(),
            in_flight: 0,
            results_tx,
            results_rx,
            shutdown,
            runtime: None,
            runtime_threads: config.runtime_threads.max(1),
            max_worker_threads: config.max_worker_threads.max(1),
            shutdown_timeout: config.shutdown_timeout,
            closed: false,
        }
    }

    /// Register a consumer.
    ///
    /// A `concurrency` of 0 creates a sequential consumer that runs tasks on
    /// the thread calling `load`; otherwise that many worker threads start
    /// now and run until [`Loader::close`]. `None` accepts every task.
    pub fn new_consumer(
        &mut self,
        concurrency: usize,
        strategy: Option<Box<dyn Strategy<I>>>,
    ) -> Result<ConsumerId> {
        self.ensure_open()?;

        let id = ConsumerId(self.consumers.len());
        let strategy = strategy.unwrap_or_else(|| Box::new(AlwaysAccept));

        let slot = if concurrency == 0 {
            ConsumerSlot::Sequential(SequentialConsumer::new(id, strategy))
        } else {
            let workers = self.parallel_workers() + concurrency;
            if workers > self.max_worker_threads {
                return Err(LoaderError::ConfigError(format!(
                    "registering {id} needs {workers} worker threads but max_worker_threads is {}",
                    self.max_worker_threads
                )));
            }

            let results = self.results_tx.clone();
            let shutdown = self.shutdown.subscribe();
            let handle = self.runtime()?.handle().clone();
            ConsumerSlot::Parallel(ParallelConsumer::spawn(
                &handle,
                id,
                concurrency,
                strategy,
                results,
                shutdown,
            ))
        };

        info!(consumer = %id, concurrency, "consumer registered");
        self.consumers.push(slot);
        Ok(id)
    }

    /// [`Loader::new_consumer`] with a concrete strategy.
    pub fn new_consumer_with<S>(&mut self, concurrency: usize, strategy: S) -> Result<ConsumerId>
    where
        S: Strategy<I> + 'static,
    {
        self.new_consumer(concurrency, Some(Box::new(strategy)))
    }

    /// Flatten `tasks` into the DAG.
    ///
    /// Names are resolved in a scope local to this call. On error nothing is
    /// added and the loader stays usable. Returns the number of tasks added,
    /// which is what `Progress::remaining` grows by.
    pub fn add(&mut self, tasks: impl IntoIterator<Item = Task<T, I>>) -> Result<usize> {
        self.ensure_open()?;

        let added = self.dag.add(tasks.into_iter().collect(), self.consumers.len())?;
        self.progress.remaining += added;
        self.progress.done = self.progress.remaining == 0;

        debug!(added, remaining = self.progress.remaining, "add complete");
        Ok(added)
    }

    /// Stored outcome of the kept task called `name`, or `None` if no such
    /// task has completed yet.
    pub fn result(&self, name: &str) -> Option<&std::result::Result<T, TaskError>> {
        self.kept.get(name)
    }

    /// Like [`Loader::result`].
    ///
    /// # Panics
    ///
    /// If no kept task called `name` has completed.
    pub fn must_result(&self, name: &str) -> &std::result::Result<T, TaskError> {
        match self.kept.get(name) {
            Some(result) => result,
            None => panic!("no kept result named {name:?}"),
        }
    }

    /// The value of a kept task that completed successfully.
    pub fn result_value(&self, name: &str) -> Option<&T> {
        self.kept.get(name).and_then(|r| r.as_ref().ok())
    }

    pub fn progress(&self) -> Progress {
        self.progress
    }

    pub fn dag(&self) -> &Dag<T, I> {
        &self.dag
    }

    /// Graphviz rendering of every task added so far.
    pub fn graphviz(&self) -> String {
        self.dag.graphviz()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(LoaderError::Closed);
        }
        Ok(())
    }

    fn parallel_workers(&self) -> usize {
        self.consumers
            .iter()
            .map(|slot| match slot {
                ConsumerSlot::Parallel(c) => c.concurrency(),
                ConsumerSlot::Sequential(_) => 0,
            })
            .sum()
    }

    fn runtime(&mut self) -> Result<&Runtime> {
        if self.runtime.is_none() {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(self.runtime_threads)
                .max_blocking_threads(self.max_worker_threads)
                .thread_name("taskloader-consumer")
                .enable_time()
                .build()
                .map_err(LoaderError::RuntimeBuild)?;

            debug!(threads = self.runtime_threads, "consumer runtime started");
            self.runtime = Some(runtime);
        }

        self.runtime.as_ref().ok_or(LoaderError::Closed)
    }
}

impl<T, I> Loader<T, I>
where
    T: Clone + Send + 'static,
    I: Eq + Hash + Clone + Debug + Send + 'static,
{
    /// Register every `[consumer.<name>]` of `config`, in name order.
    pub fn register_consumers(
        &mut self,
        config: &LoaderConfig,
    ) -> Result<BTreeMap<String, ConsumerId>> {
        let mut ids = BTreeMap::new();

        for (name, consumer) in config.consumer.iter() {
            let id = self.new_consumer(consumer.concurrency, Some(consumer.strategy.build()))?;
            debug!(name = %name, consumer = %id, strategy = ?consumer.strategy, "configured consumer");
            ids.insert(name.clone(), id);
        }

        Ok(ids)
    }
}

impl<T, I> Loader<T, I> {
    /// Stop every consumer and release held results.
    ///
    /// Waits up to the configured shutdown timeout for running tasks.
    /// Tasks that were dispatched but not started are abandoned. Calling
    /// `close` again is a no-op; it also runs on drop.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        self.shutdown.send_replace(true);
        // Managers parked on a full channel give up instead of waiting.
        self.results_rx.close();

        let managers: Vec<_> = self
            .consumers
            .drain(..)
            .filter_map(|slot| match slot {
                ConsumerSlot::Parallel(c) => {
                    debug!(consumer = %c.id(), "stopping consumer");
                    Some(c.into_manager())
                }
                ConsumerSlot::Sequential(_) => None,
            })
            .collect();

        if let Some(runtime) = self.runtime.take() {
            let timeout = self.shutdown_timeout;
            // The timer must be created inside the runtime.
            let joined = runtime.block_on(async move {
                tokio::time::timeout(timeout, async move {
                    for manager in managers {
                        let _ = manager.await;
                    }
                })
                .await
            });

            if joined.is_err() {
                warn!(?timeout, "consumer managers did not stop in time");
            }

            runtime.shutdown_timeout(timeout);
        }

        self.received.clear();
        self.dag.release_all();

        info!(
            completed = self.progress.completed,
            remaining = self.progress.remaining,
            "loader closed"
        );
    }
}

impl<T, I> Default for Loader<T, I>
where
    T: Clone + Send + 'static,
    I: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, I> Drop for Loader<T, I> {
    fn drop(&mut self) {
        self.close();
    }
}
