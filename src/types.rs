use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Canonical task identifier used throughout the crate.
pub type TaskId = String;

/// Lifecycle state of a registered task.
///
/// Only the executor moves a task between states:
/// `Pending -> Processing -> {Completed | Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happens to the pipeline when a task of a phase fails.
///
/// - `Strict`: any failure aborts the pipeline; later phases are skipped.
/// - `Tolerant`: failures are counted and reported, the pipeline continues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    #[default]
    Strict,
    Tolerant,
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "strict" => Ok(FailurePolicy::Strict),
            "tolerant" => Ok(FailurePolicy::Tolerant),
            other => Err(format!(
                "invalid failure policy: {other} (expected \"strict\" or \"tolerant\")"
            )),
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailurePolicy::Strict => f.write_str("strict"),
            FailurePolicy::Tolerant => f.write_str("tolerant"),
        }
    }
}

/// How the tasks of a phase are dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// One task after another through the single-task executor.
    Sequential,
    /// All tasks at once through the batch scheduler, capped by the pool bound.
    BoundedParallel,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::Sequential => f.write_str("sequential"),
            ExecutionMode::BoundedParallel => f.write_str("bounded-parallel"),
        }
    }
}

/// Behaviour when a task that already reached a terminal state is executed
/// again.
///
/// - `Rerun` (default): run the function again and append another log entry.
/// - `Reject`: fail with `AlreadyTerminal` and leave the task untouched.
/// - `Memoize`: return the stored result of a completed task without running
///   it; a failed task is rejected as with `Reject`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReexecutionPolicy {
    #[default]
    Rerun,
    Reject,
    Memoize,
}

impl FromStr for ReexecutionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "rerun" => Ok(ReexecutionPolicy::Rerun),
            "reject" => Ok(ReexecutionPolicy::Reject),
            "memoize" => Ok(ReexecutionPolicy::Memoize),
            other => Err(format!(
                "invalid reexecution policy: {other} (expected \"rerun\", \"reject\" or \"memoize\")"
            )),
        }
    }
}
