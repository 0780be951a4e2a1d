// src/exec/mod.rs

//! Task execution layer.
//!
//! - [`task`] defines the `Task` trait and closure adapters.
//! - [`executor`] runs a single task through the gate and records the result.
//! - [`pool`] runs batches concurrently under a shared worker bound.
//! - [`command`] runs shell commands for pipeline steps.

pub mod command;
pub mod executor;
pub mod pool;
pub mod task;

pub use executor::Executor;
pub use pool::{failure_message, BatchOutcome, WorkerPool, DEFAULT_WORKERS};
pub use task::{BlockingTask, FnTask, Task, TaskFuture, TaskOutput};
