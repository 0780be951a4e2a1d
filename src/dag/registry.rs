// src/dag/registry.rs

//! Task registry: id -> definition plus mutable lifecycle state.
//!
//! The backing map sits behind a single coarse mutex. Every read or write
//! holds it only for the duration of a map lookup; task functions are never
//! invoked while the lock is held.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::dag::gate;
use crate::errors::{PipedagError, Result};
use crate::exec::task::{Task, TaskOutput};
use crate::types::{ReexecutionPolicy, TaskId, TaskStatus};

/// Registered task: definition plus lifecycle state.
pub struct TaskEntry {
    pub id: TaskId,
    pub task: Arc<dyn Task>,
    /// Declared dependencies, in declaration order.
    pub deps: Vec<TaskId>,
    pub status: TaskStatus,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub result: Option<TaskOutput>,
    pub error: Option<String>,
    /// Monotonic start of the current attempt, used for duration math.
    started_at: Option<Instant>,
}

impl fmt::Debug for TaskEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskEntry")
            .field("id", &self.id)
            .field("deps", &self.deps)
            .field("status", &self.status)
            .field("start_time", &self.start_time)
            .field("end_time", &self.end_time)
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

/// Read-only copy of a task's state, detached from the registry lock.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskSnapshot {
    pub id: TaskId,
    pub deps: Vec<TaskId>,
    pub status: TaskStatus,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub result: Option<TaskOutput>,
    pub error: Option<String>,
}

/// What the executor should do after a successful [`Registry::begin`].
pub(crate) enum Admission {
    /// Run the task; its status is now `Processing`.
    Run {
        task: Arc<dyn Task>,
        start_time: DateTime<Utc>,
    },
    /// Memoized re-execution: hand back the stored result untouched.
    Cached(TaskOutput),
}

/// Timing information for a finished attempt.
pub(crate) struct Finished {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration: Duration,
}

#[derive(Default)]
pub struct Registry {
    tasks: Mutex<HashMap<TaskId, TaskEntry>>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("statuses", &self.get_all_statuses())
            .finish()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<TaskId, TaskEntry>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a task. Dependencies do not need to exist yet; they are
    /// checked by the gate right before execution.
    pub fn register(&self, id: TaskId, task: Arc<dyn Task>, deps: Vec<TaskId>) -> Result<()> {
        let mut tasks = self.lock();
        if tasks.contains_key(&id) {
            return Err(PipedagError::DuplicateTask(id));
        }

        debug!(task = %id, ?deps, "registering task");
        tasks.insert(
            id.clone(),
            TaskEntry {
                id,
                task,
                deps,
                status: TaskStatus::Pending,
                start_time: None,
                end_time: None,
                result: None,
                error: None,
                started_at: None,
            },
        );
        Ok(())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn get_status(&self, id: &str) -> Result<TaskStatus> {
        self.lock()
            .get(id)
            .map(|entry| entry.status)
            .ok_or_else(|| PipedagError::TaskNotFound(id.to_string()))
    }

    /// Snapshot of every task's status. Later mutations do not show up in the
    /// returned map.
    pub fn get_all_statuses(&self) -> BTreeMap<TaskId, TaskStatus> {
        self.lock()
            .iter()
            .map(|(id, entry)| (id.clone(), entry.status))
            .collect()
    }

    pub fn snapshot(&self, id: &str) -> Result<TaskSnapshot> {
        let tasks = self.lock();
        let entry = tasks
            .get(id)
            .ok_or_else(|| PipedagError::TaskNotFound(id.to_string()))?;
        Ok(TaskSnapshot {
            id: entry.id.clone(),
            deps: entry.deps.clone(),
            status: entry.status,
            start_time: entry.start_time,
            end_time: entry.end_time,
            result: entry.result.clone(),
            error: entry.error.clone(),
        })
    }

    /// Run the execution gate for `id` without changing any state.
    pub fn check_gate(&self, id: &str) -> Result<()> {
        gate::check(&self.lock(), id)
    }

    /// Admit `id` for execution.
    ///
    /// Gate check and the transition to `Processing` happen under one lock
    /// acquisition, so a dependency cannot change state in between. On any
    /// error the task is left exactly as it was.
    pub(crate) fn begin(&self, id: &str, policy: ReexecutionPolicy) -> Result<Admission> {
        let mut tasks = self.lock();
        gate::check(&tasks, id)?;

        let entry = tasks
            .get_mut(id)
            .ok_or_else(|| PipedagError::TaskNotFound(id.to_string()))?;

        match (entry.status, policy) {
            (TaskStatus::Processing, _) => {
                return Err(PipedagError::TaskInProgress(entry.id.clone()));
            }
            (TaskStatus::Completed, ReexecutionPolicy::Memoize) => {
                debug!(task = %entry.id, "memoized re-execution; returning stored result");
                return Ok(Admission::Cached(entry.result.clone().unwrap_or_default()));
            }
            (status, ReexecutionPolicy::Reject | ReexecutionPolicy::Memoize)
                if status.is_terminal() =>
            {
                return Err(PipedagError::AlreadyTerminal {
                    task: entry.id.clone(),
                    status,
                });
            }
            _ => {}
        }

        let start_time = Utc::now();
        entry.status = TaskStatus::Processing;
        entry.start_time = Some(start_time);
        entry.started_at = Some(Instant::now());
        entry.end_time = None;
        entry.result = None;
        entry.error = None;

        Ok(Admission::Run {
            task: Arc::clone(&entry.task),
            start_time,
        })
    }

    /// Record the outcome of the attempt started by [`Registry::begin`].
    pub(crate) fn finish(
        &self,
        id: &str,
        outcome: std::result::Result<&TaskOutput, &str>,
    ) -> Result<Finished> {
        let mut tasks = self.lock();
        let entry = tasks
            .get_mut(id)
            .ok_or_else(|| PipedagError::TaskNotFound(id.to_string()))?;

        let end_time = Utc::now();
        let duration = entry
            .started_at
            .take()
            .map(|started| started.elapsed())
            .unwrap_or_default();
        let start_time = entry.start_time.unwrap_or(end_time);

        match outcome {
            Ok(value) => {
                entry.status = TaskStatus::Completed;
                entry.result = Some(value.clone());
            }
            Err(message) => {
                entry.status = TaskStatus::Failed;
                entry.error = Some(message.to_string());
            }
        }
        entry.end_time = Some(end_time);

        Ok(Finished {
            start_time,
            end_time,
            duration,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::task::FnTask;
    use serde_json::json;

    fn noop() -> Arc<dyn Task> {
        Arc::new(FnTask::new(|| async { Ok(json!(null)) }))
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let registry = Registry::new();
        registry.register("a".into(), noop(), vec![]).unwrap();
        let err = registry.register("a".into(), noop(), vec![]).unwrap_err();
        assert!(matches!(err, PipedagError::DuplicateTask(id) if id == "a"));
    }

    #[test]
    fn unknown_status_is_not_found() {
        let registry = Registry::new();
        assert!(matches!(
            registry.get_status("ghost"),
            Err(PipedagError::TaskNotFound(id)) if id == "ghost"
        ));
    }

    #[test]
    fn status_map_is_a_snapshot() {
        let registry = Registry::new();
        registry.register("a".into(), noop(), vec![]).unwrap();
        let before = registry.get_all_statuses();

        let Admission::Run { .. } = registry.begin("a", ReexecutionPolicy::Rerun).unwrap() else {
            panic!("expected a fresh run");
        };

        assert_eq!(before["a"], TaskStatus::Pending);
        assert_eq!(registry.get_status("a").unwrap(), TaskStatus::Processing);
    }

    #[test]
    fn begin_twice_reports_in_progress() {
        let registry = Registry::new();
        registry.register("a".into(), noop(), vec![]).unwrap();
        assert!(registry.begin("a", ReexecutionPolicy::Rerun).is_ok());
        assert!(matches!(
            registry.begin("a", ReexecutionPolicy::Rerun),
            Err(PipedagError::TaskInProgress(_))
        ));
    }

    #[test]
    fn finish_records_terminal_state() {
        let registry = Registry::new();
        registry.register("a".into(), noop(), vec![]).unwrap();
        let _ = registry.begin("a", ReexecutionPolicy::Rerun).unwrap();
        let finished = registry.finish("a", Err("boom")).unwrap();

        let snap = registry.snapshot("a").unwrap();
        assert_eq!(snap.status, TaskStatus::Failed);
        assert_eq!(snap.error.as_deref(), Some("boom"));
        assert!(snap.result.is_none());
        assert!(finished.start_time <= finished.end_time);
    }
}
