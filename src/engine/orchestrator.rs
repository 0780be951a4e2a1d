// src/engine/orchestrator.rs

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::dag::{Registry, TaskSnapshot};
use crate::engine::log::{ExecutionLog, LogEntry};
use crate::errors::Result;
use crate::exec::{BatchOutcome, Executor, Task, TaskOutput, WorkerPool, DEFAULT_WORKERS};
use crate::fs::FileSystem;
use crate::types::{ReexecutionPolicy, TaskId, TaskStatus};

/// Knobs for a single [`Orchestrator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorOptions {
    /// Worker-pool bound used by every batch.
    pub workers: usize,
    /// What to do when a task in a terminal state is executed again.
    pub reexecution: ReexecutionPolicy,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            reexecution: ReexecutionPolicy::default(),
        }
    }
}

/// Owns the task registry, the execution log and the worker pool.
///
/// There is no global state: each pipeline run creates one orchestrator and
/// drops it at the end.
#[derive(Debug)]
pub struct Orchestrator {
    registry: Arc<Registry>,
    log: Arc<ExecutionLog>,
    executor: Executor,
    pool: WorkerPool,
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new(OrchestratorOptions::default())
    }
}

impl Orchestrator {
    pub fn new(options: OrchestratorOptions) -> Self {
        let registry = Arc::new(Registry::new());
        let log = Arc::new(ExecutionLog::new());
        let executor = Executor::new(Arc::clone(&registry), Arc::clone(&log), options.reexecution);
        let pool = WorkerPool::new(options.workers);

        debug!(workers = pool.size(), reexecution = ?options.reexecution, "orchestrator created");

        Self {
            registry,
            log,
            executor,
            pool,
        }
    }

    /// Register `task` under `id` with the given dependency ids.
    pub fn register<T, I, S>(&self, id: impl Into<TaskId>, task: T, deps: I) -> Result<()>
    where
        T: Task + 'static,
        I: IntoIterator<Item = S>,
        S: Into<TaskId>,
    {
        self.register_shared(id, Arc::new(task), deps)
    }

    /// Same as [`Orchestrator::register`] for an already shared task.
    pub fn register_shared<I, S>(&self, id: impl Into<TaskId>, task: Arc<dyn Task>, deps: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<TaskId>,
    {
        let deps = deps.into_iter().map(Into::into).collect();
        self.registry.register(id.into(), task, deps)
    }

    pub fn get_status(&self, id: &str) -> Result<TaskStatus> {
        self.registry.get_status(id)
    }

    pub fn get_all_statuses(&self) -> BTreeMap<TaskId, TaskStatus> {
        self.registry.get_all_statuses()
    }

    pub fn task(&self, id: &str) -> Result<TaskSnapshot> {
        self.registry.snapshot(id)
    }

    pub fn is_registered(&self, id: &str) -> bool {
        self.registry.contains(id)
    }

    /// Execute a single task, propagating any failure to the caller.
    pub async fn execute(&self, id: &str) -> Result<TaskOutput> {
        self.executor.execute(id).await
    }

    /// Execute `ids` under the worker-pool bound, collecting failures instead
    /// of propagating them.
    pub async fn execute_batch(&self, ids: &[TaskId]) -> BatchOutcome {
        self.pool.run_batch(&self.executor, ids).await
    }

    pub fn workers(&self) -> usize {
        self.pool.size()
    }

    pub fn reexecution(&self) -> ReexecutionPolicy {
        self.executor.reexecution()
    }

    pub fn log(&self) -> &ExecutionLog {
        &self.log
    }

    pub fn log_entries(&self) -> Vec<LogEntry> {
        self.log.entries()
    }

    pub fn flush_log(&self, fs: &dyn FileSystem, path: &Path) -> Result<()> {
        self.log.flush(fs, path)
    }
}
