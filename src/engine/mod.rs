// src/engine/mod.rs

//! Orchestration engine: the public facade and its execution log.

pub mod log;
pub mod orchestrator;

pub use log::{ExecutionLog, LogEntry, LogOutcome};
pub use orchestrator::{Orchestrator, OrchestratorOptions};
