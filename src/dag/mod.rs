// src/dag/mod.rs

//! Dependency graph of tasks.
//!
//! - [`graph`] holds the flat-array DAG: per-task edge lists, result slots
//!   and the pending frontier of ready tasks.
//! - [`scope`] implements name visibility while a task tree is flattened.
//! - [`diagnostics`] renders task paths and exports the graph to `petgraph`.

pub mod diagnostics;
pub mod graph;
pub mod scope;

pub use graph::{Dag, Node};
pub use scope::Scope;
