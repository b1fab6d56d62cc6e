// src/cli.rs

//! Command-line arguments of the `taskloader` demo binary.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `taskloader`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "taskloader",
    version,
    about = "Load simulated network files per host and combine them on CPU workers.",
    long_about = None
)]
pub struct CliArgs {
    /// Loader configuration (TOML). Consumers named `net` and `cpu` in the
    /// file replace the built-in ones.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Block until everything has loaded instead of polling with a progress
    /// readout.
    #[arg(long)]
    pub all: bool,

    /// Concurrent connections allowed to a single host.
    #[arg(long, value_name = "N", default_value_t = 2)]
    pub per_host: usize,

    /// Worker threads on the network consumer.
    #[arg(long, value_name = "N", default_value_t = 5)]
    pub net_workers: usize,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `TASKLOADER_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

pub fn parse() -> CliArgs {
    CliArgs::parse()
}
