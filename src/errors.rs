// src/errors.rs

//! Crate-wide error types.
//!
//! [`LoaderError`] covers everything the loader itself can get wrong: graph
//! construction, duplicate kept names, configuration and shutdown. Failures
//! of user `load` functions are [`TaskError`]s; they never abort a run and are
//! only observable through kept results and `None` inputs of successors.

use thiserror::Error;

use crate::types::ConsumerId;

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("named requirement {name:?} of task {task} not in scope")]
    NameNotInScope { name: String, task: String },

    #[error("task {task} requires {name:?}, which names one of its own ancestors")]
    AncestorReference { name: String, task: String },

    #[error("task {task} uses unregistered consumer {consumer}")]
    UnknownConsumer { task: String, consumer: ConsumerId },

    #[error("task {task} is kept but has no name to retrieve it by")]
    KeepWithoutName { task: String },

    #[error("kept named result {0:?} already exists (but must be unique)")]
    DuplicateKeptName(String),

    #[error("no progress possible with {remaining} tasks remaining: every pending task is deferred")]
    Stalled { remaining: usize },

    #[error("loader is closed")]
    Closed,

    #[error("completion channel closed unexpectedly")]
    ChannelClosed,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Failed to build consumer runtime: {0}")]
    RuntimeBuild(#[source] std::io::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),
}

/// Why a task produced no result.
#[derive(Error, Debug)]
pub enum TaskError {
    #[error("task failed: {0:#}")]
    Failed(#[from] anyhow::Error),

    #[error("task panicked: {0}")]
    Panicked(String),

    #[error("named requirement {0:?} produced no result")]
    UpstreamFailed(String),
}

pub type Result<T> = std::result::Result<T, LoaderError>;
