// src/exec/executor.rs

//! Single-task executor.
//!
//! `execute` returns an explicit `Result`: the single-task caller propagates
//! the error with `?`, while the batch scheduler collects it per task. Both
//! paths see exactly the same data.

use std::sync::Arc;

use anyhow::anyhow;
use tracing::{debug, info, warn};

use crate::dag::registry::{Admission, Registry};
use crate::engine::log::{ExecutionLog, LogEntry};
use crate::errors::{PipedagError, Result};
use crate::exec::task::TaskOutput;
use crate::types::ReexecutionPolicy;

/// Cheap, cloneable handle that runs tasks against a shared registry and log.
#[derive(Debug, Clone)]
pub struct Executor {
    registry: Arc<Registry>,
    log: Arc<ExecutionLog>,
    reexecution: ReexecutionPolicy,
}

impl Executor {
    pub fn new(
        registry: Arc<Registry>,
        log: Arc<ExecutionLog>,
        reexecution: ReexecutionPolicy,
    ) -> Self {
        Self {
            registry,
            log,
            reexecution,
        }
    }

    pub fn reexecution(&self) -> ReexecutionPolicy {
        self.reexecution
    }

    /// Run one task.
    ///
    /// - Gate or admission failures (`DependencyNotSatisfied`, `TaskNotFound`,
    ///   `TaskInProgress`, `AlreadyTerminal`) leave the task untouched and
    ///   append nothing to the log.
    /// - A function failure marks the task `Failed`, appends a failure entry
    ///   and is returned as `TaskExecution` wrapping the original error.
    pub async fn execute(&self, id: &str) -> Result<TaskOutput> {
        let (task, start_time) = match self.registry.begin(id, self.reexecution)? {
            Admission::Run { task, start_time } => (task, start_time),
            Admission::Cached(value) => return Ok(value),
        };

        info!(task = %id, %start_time, "task started");

        // `run()` itself is called inside the spawned task: a panic while
        // building the future must also end up as a failure, never leave the
        // status stuck at `Processing`.
        let outcome = match tokio::spawn(async move { task.run().await }).await {
            Ok(outcome) => outcome,
            Err(join_err) => Err(anyhow!("task aborted: {join_err}")),
        };

        match outcome {
            Ok(value) => {
                let finished = self.registry.finish(id, Ok(&value))?;
                info!(
                    task = %id,
                    duration_ms = finished.duration.as_millis() as u64,
                    "task completed"
                );
                self.log.append(LogEntry::completed(
                    id.to_string(),
                    finished.start_time,
                    finished.end_time,
                    finished.duration,
                ));
                Ok(value)
            }
            Err(err) => {
                let message = format!("{err:#}");
                let finished = self.registry.finish(id, Err(&message))?;
                warn!(task = %id, error = %message, "task failed");
                self.log.append(LogEntry::failed(
                    id.to_string(),
                    finished.start_time,
                    finished.end_time,
                    message,
                ));
                debug!(task = %id, "propagating task failure to caller");
                Err(PipedagError::TaskExecution {
                    task: id.to_string(),
                    source: err,
                })
            }
        }
    }
}
