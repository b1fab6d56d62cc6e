// src/config/model.rs

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::num::NonZero;
use std::time::Duration;

use serde::Deserialize;

use crate::strategy::{AlwaysAccept, MaxConcurrent, PerKeyLimit, Strategy};

/// Configuration as read from a TOML file, before validation.
///
/// ```toml
/// result_buffer = 1024
/// runtime_threads = 2
/// shutdown_timeout_ms = 5000
///
/// [consumer.net]
/// concurrency = 5
/// strategy = { kind = "per_key", limit = 2 }
///
/// [consumer.cpu]
/// concurrency = 4
/// ```
///
/// Every field is optional.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawLoaderConfig {
    /// Capacity of the channel parallel consumers report completions on.
    #[serde(default = "default_result_buffer")]
    pub result_buffer: usize,

    /// Async threads hosting parallel consumer managers.
    #[serde(default = "default_runtime_threads")]
    pub runtime_threads: usize,

    /// Upper bound on worker threads across all parallel consumers.
    #[serde(default = "default_max_worker_threads")]
    pub max_worker_threads: usize,

    /// How long `close` waits for in-flight tasks.
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,

    /// Consumers from `[consumer.<name>]`, registered in name order.
    #[serde(default)]
    pub consumer: BTreeMap<String, ConsumerConfig>,
}

/// `[consumer.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConsumerConfig {
    /// Worker threads; 0 runs tasks on the thread calling `load`.
    #[serde(default)]
    pub concurrency: usize,

    #[serde(default)]
    pub strategy: StrategyConfig,
}

/// Which bundled strategy a configured consumer uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategyConfig {
    #[default]
    AlwaysAccept,
    /// At most `limit` running tasks in total.
    MaxConcurrent { limit: usize },
    /// At most `limit` running tasks per info value.
    PerKey { limit: usize },
}

impl StrategyConfig {
    pub fn build<I>(&self) -> Box<dyn Strategy<I>>
    where
        I: Eq + Hash + Clone + Debug + Send + 'static,
    {
        match *self {
            StrategyConfig::AlwaysAccept => Box::new(AlwaysAccept),
            StrategyConfig::MaxConcurrent { limit } => Box::new(MaxConcurrent::new(limit)),
            StrategyConfig::PerKey { limit } => Box::new(PerKeyLimit::<I>::new(limit)),
        }
    }
}

/// Validated loader configuration.
///
/// Obtain one from [`crate::config::load_and_validate`], from
/// `LoaderConfig::try_from(raw)`, or use [`LoaderConfig::default`].
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    pub result_buffer: usize,
    pub runtime_threads: usize,
    pub max_worker_threads: usize,
    pub shutdown_timeout: Duration,
    pub consumer: BTreeMap<String, ConsumerConfig>,
}

impl LoaderConfig {
    pub(crate) fn new_unchecked(raw: RawLoaderConfig) -> Self {
        Self {
            result_buffer: raw.result_buffer,
            runtime_threads: raw.runtime_threads,
            max_worker_threads: raw.max_worker_threads,
            shutdown_timeout: Duration::from_millis(raw.shutdown_timeout_ms),
            consumer: raw.consumer,
        }
    }
}

impl Default for RawLoaderConfig {
    fn default() -> Self {
        Self {
            result_buffer: default_result_buffer(),
            runtime_threads: default_runtime_threads(),
            max_worker_threads: default_max_worker_threads(),
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
            consumer: BTreeMap::new(),
        }
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self::new_unchecked(RawLoaderConfig::default())
    }
}

// Enough room for every task to finish between two `load` calls at ~16 Hz
// when tasks take about a quarter of a millisecond on each logical CPU.
fn default_result_buffer() -> usize {
    let cpus = std::thread::available_parallelism()
        .map(NonZero::get)
        .unwrap_or(1);
    64 * 4 * cpus
}

fn default_runtime_threads() -> usize {
    2
}

fn default_max_worker_threads() -> usize {
    512
}

fn default_shutdown_timeout_ms() -> u64 {
    5_000
}
