// src/dag/mod.rs

//! Task registry and dependency handling.
//!
//! - [`registry`] owns every task entry and its lifecycle state.
//! - [`gate`] decides whether a task's dependencies allow it to run.
//! - [`graph`] is the declared-dependency graph used for cycle detection
//!   and dry-run ordering.

pub mod gate;
pub mod graph;
pub mod registry;

pub use graph::DagGraph;
pub use registry::{Registry, TaskEntry, TaskSnapshot};
