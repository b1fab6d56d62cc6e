// src/config/validate.rs

use crate::config::model::{LoaderConfig, RawLoaderConfig, StrategyConfig};
use crate::errors::{LoaderError, Result};

impl TryFrom<RawLoaderConfig> for LoaderConfig {
    type Error = LoaderError;

    fn try_from(raw: RawLoaderConfig) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(LoaderConfig::new_unchecked(raw))
    }
}

fn validate_raw_config(cfg: &RawLoaderConfig) -> Result<()> {
    validate_global_config(cfg)?;
    validate_consumers(cfg)?;
    Ok(())
}

fn validate_global_config(cfg: &RawLoaderConfig) -> Result<()> {
    if cfg.result_buffer == 0 {
        return Err(LoaderError::ConfigError(
            "result_buffer must be >= 1 (got 0)".to_string(),
        ));
    }

    if cfg.runtime_threads == 0 {
        return Err(LoaderError::ConfigError(
            "runtime_threads must be >= 1 (got 0)".to_string(),
        ));
    }

    Ok(())
}

fn validate_consumers(cfg: &RawLoaderConfig) -> Result<()> {
    let mut workers = 0usize;

    for (name, consumer) in cfg.consumer.iter() {
        if name.trim().is_empty() {
            return Err(LoaderError::ConfigError(
                "consumer names must not be empty".to_string(),
            ));
        }

        match consumer.strategy {
            StrategyConfig::MaxConcurrent { limit: 0 } | StrategyConfig::PerKey { limit: 0 } => {
                return Err(LoaderError::ConfigError(format!(
                    "consumer '{name}' has a strategy limit of 0, which never admits a task"
                )));
            }
            _ => {}
        }

        workers += consumer.concurrency;
    }

    if workers > cfg.max_worker_threads {
        return Err(LoaderError::ConfigError(format!(
            "consumers need {workers} worker threads but max_worker_threads is {}",
            cfg.max_worker_threads
        )));
    }

    Ok(())
}
