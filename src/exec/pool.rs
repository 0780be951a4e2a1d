// src/exec/pool.rs

//! Bounded worker pool and batch scheduler.
//!
//! The pool is a fixed number of permits created once per orchestrator and
//! shared by every batch it runs. Each task of a batch is spawned as its own
//! Tokio task and waits for a permit before invoking the executor, so at
//! most `size` task functions are in flight at any time. Waiting tasks are
//! the only queue; there is no extra admission buffer.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::errors::PipedagError;
use crate::exec::executor::Executor;
use crate::exec::task::TaskOutput;
use crate::types::TaskId;

/// Default number of concurrent workers.
pub const DEFAULT_WORKERS: usize = 4;

/// Result of a batch: completed task results plus `(id, error)` pairs for
/// every task that failed for any reason.
///
/// `failed` is in completion order; callers must not assume any relation to
/// the submission order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOutcome {
    pub results: HashMap<TaskId, TaskOutput>,
    pub failed: Vec<(TaskId, String)>,
}

impl BatchOutcome {
    pub fn total(&self) -> usize {
        self.results.len() + self.failed.len()
    }

    pub fn succeeded(&self) -> usize {
        self.results.len()
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn failed_ids(&self) -> impl Iterator<Item = &str> {
        self.failed.iter().map(|(id, _)| id.as_str())
    }
}

/// Message recorded in a batch's failed list for the given error.
///
/// For function failures this is the task's own error text (the same text
/// stored on the task); for gate/admission failures it is the error itself.
pub fn failure_message(err: &PipedagError) -> String {
    match err {
        PipedagError::TaskExecution { source, .. } => format!("{source:#}"),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    /// Create a pool with `size` workers. A size of 0 is bumped to 1.
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Run `ids` concurrently under the pool bound.
    ///
    /// Never aborts early: a failing task does not cancel or skip its
    /// siblings. Duplicate ids are run once.
    pub async fn run_batch(&self, executor: &Executor, ids: &[TaskId]) -> BatchOutcome {
        let mut seen = HashSet::new();
        let unique: Vec<TaskId> = ids
            .iter()
            .filter(|id| seen.insert(id.as_str()))
            .cloned()
            .collect();

        debug!(batch = unique.len(), workers = self.size, "dispatching batch");

        let mut pending: HashSet<TaskId> = unique.iter().cloned().collect();
        let mut join_set = JoinSet::new();

        for id in unique {
            let permits = Arc::clone(&self.permits);
            let executor = executor.clone();

            join_set.spawn(async move {
                let result = match permits.acquire_owned().await {
                    Ok(_permit) => executor.execute(&id).await,
                    Err(_) => Err(PipedagError::Other(anyhow::anyhow!(
                        "worker pool closed unexpectedly"
                    ))),
                };
                (id, result)
            });
        }

        let mut outcome = BatchOutcome::default();

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((id, Ok(value))) => {
                    pending.remove(&id);
                    outcome.results.insert(id, value);
                }
                Ok((id, Err(err))) => {
                    pending.remove(&id);
                    outcome.failed.push((id, failure_message(&err)));
                }
                Err(join_err) => {
                    warn!(error = %join_err, "batch worker did not finish");
                }
            }
        }

        // Workers that died without reporting still count as failures, so
        // every submitted id appears in exactly one output.
        let mut lost: Vec<TaskId> = pending.into_iter().collect();
        lost.sort();
        for id in lost {
            outcome
                .failed
                .push((id, "worker terminated before reporting a result".to_string()));
        }

        debug!(
            succeeded = outcome.results.len(),
            failed = outcome.failed.len(),
            "batch finished"
        );

        outcome
    }
}
