// src/lib.rs

//! Incremental loader for graphs of dependent tasks.
//!
//! Tasks are declared as nested [`Task`] trees, added to a [`Loader`], and
//! run by consumers: the built-in sequential consumer on the calling thread,
//! or parallel consumers with their own worker threads. A [`Strategy`] on
//! each consumer decides when a ready task may start. Call
//! [`Loader::load`] with a time budget to make progress in slices, or
//! [`Loader::load_all`] to block until everything has loaded.

pub mod cli;
pub mod config;
pub mod consumer;
pub mod dag;
pub mod demo;
pub mod engine;
pub mod errors;
pub mod logging;
pub mod strategy;
pub mod task;
pub mod types;

pub use config::LoaderConfig;
pub use engine::Loader;
pub use errors::{LoaderError, Result, TaskError};
pub use strategy::{AlwaysAccept, MaxConcurrent, PerKeyLimit, Strategy};
pub use task::Task;
pub use types::{ConsumerId, Progress};
