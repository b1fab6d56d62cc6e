// src/config/loader.rs

use std::fs;
use std::path::Path;

use crate::config::model::{LoaderConfig, RawLoaderConfig};
use crate::errors::Result;

/// Load a configuration file and return the raw, unvalidated settings.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawLoaderConfig> {
    let contents = fs::read_to_string(path.as_ref())?;
    let config: RawLoaderConfig = toml::from_str(&contents)?;
    Ok(config)
}

/// Parse and validate configuration held in memory.
pub fn load_from_str(contents: &str) -> Result<LoaderConfig> {
    let raw: RawLoaderConfig = toml::from_str(contents)?;
    LoaderConfig::try_from(raw)
}

/// Load a configuration file and validate it.
///
/// This is the recommended entry point: it reads TOML, applies defaults and
/// rejects settings the loader cannot run with.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<LoaderConfig> {
    let raw = load_from_path(path)?;
    LoaderConfig::try_from(raw)
}
