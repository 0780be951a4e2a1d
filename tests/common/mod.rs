#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use pipedag::engine::{Orchestrator, OrchestratorOptions};
use pipedag::types::ReexecutionPolicy;

pub use pipedag_test_utils::init_tracing;

/// Orchestrator with the given pool bound and default re-execution policy.
pub fn orchestrator(workers: usize) -> Orchestrator {
    init_tracing();
    Orchestrator::new(OrchestratorOptions {
        workers,
        reexecution: ReexecutionPolicy::Rerun,
    })
}

pub fn orchestrator_with(reexecution: ReexecutionPolicy) -> Orchestrator {
    init_tracing();
    Orchestrator::new(OrchestratorOptions {
        workers: 4,
        reexecution,
    })
}

/// Shared call list for `RecordingTask`s.
pub fn call_log() -> Arc<Mutex<Vec<String>>> {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn ids(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}
