#![allow(dead_code)]

use std::collections::BTreeMap;

use taskloader::config::{ConsumerConfig, LoaderConfig, RawLoaderConfig, StrategyConfig};
use taskloader::Task;

/// Task returning `value`, ignoring its inputs.
pub fn constant<T, I>(value: T) -> Task<T, I>
where
    T: Clone + Send + Sync + 'static,
{
    Task::new(move |_| Ok(value.clone()))
}

/// Task returning its inputs joined by `sep`, with `"-"` for a missing input.
pub fn concat<I>(sep: &'static str) -> Task<String, I> {
    Task::new(move |inputs: Vec<Option<String>>| {
        let parts: Vec<String> = inputs
            .into_iter()
            .map(|input| input.unwrap_or_else(|| "-".to_string()))
            .collect();
        Ok(parts.join(sep))
    })
}

/// Task returning the sum of its present inputs.
pub fn sum<I>() -> Task<i64, I> {
    Task::new(|inputs: Vec<Option<i64>>| Ok(inputs.into_iter().flatten().sum()))
}

/// Task whose `load` always fails with `message`.
pub fn failing<T: 'static, I>(message: &'static str) -> Task<T, I> {
    Task::new(move |_| Err(anyhow::anyhow!(message)))
}

/// Builder for `LoaderConfig` to simplify test setup.
pub struct LoaderConfigBuilder {
    config: RawLoaderConfig,
}

impl LoaderConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: RawLoaderConfig {
                consumer: BTreeMap::new(),
                ..RawLoaderConfig::default()
            },
        }
    }

    pub fn with_result_buffer(mut self, capacity: usize) -> Self {
        self.config.result_buffer = capacity;
        self
    }

    pub fn with_runtime_threads(mut self, threads: usize) -> Self {
        self.config.runtime_threads = threads;
        self
    }

    pub fn with_shutdown_timeout_ms(mut self, ms: u64) -> Self {
        self.config.shutdown_timeout_ms = ms;
        self
    }

    pub fn with_consumer(mut self, name: &str, concurrency: usize, strategy: StrategyConfig) -> Self {
        self.config.consumer.insert(
            name.to_string(),
            ConsumerConfig {
                concurrency,
                strategy,
            },
        );
        self
    }

    pub fn build(self) -> LoaderConfig {
        LoaderConfig::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for LoaderConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
