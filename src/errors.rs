// src/errors.rs

//! Crate-wide error type and helpers.

use thiserror::Error;

use crate::types::{TaskId, TaskStatus};

#[derive(Error, Debug)]
pub enum PipedagError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Task already registered: {0}")]
    DuplicateTask(TaskId),

    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("Dependency {dependency} not completed for task {task}")]
    DependencyNotSatisfied { task: TaskId, dependency: TaskId },

    #[error("Task {task} failed: {source}")]
    TaskExecution {
        task: TaskId,
        #[source]
        source: anyhow::Error,
    },

    #[error("Task {task} is already {status}; re-execution is rejected")]
    AlreadyTerminal { task: TaskId, status: TaskStatus },

    #[error("Task {0} is already processing")]
    TaskInProgress(TaskId),

    #[error("Validation failed: {0}")]
    ValidationFailure(String),

    #[error("Build failed: {0}")]
    BuildFailure(String),

    #[error("Cycle detected in pipeline: {0}")]
    DagCycle(String),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PipedagError {
    /// The task failure wrapped by [`PipedagError::TaskExecution`], if any.
    pub fn task_failure(&self) -> Option<&anyhow::Error> {
        match self {
            PipedagError::TaskExecution { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Whether this error (or the task failure it wraps) is a
    /// `ValidationFailure` or `BuildFailure` raised by a pipeline step.
    pub fn is_step_failure(&self) -> bool {
        match self {
            PipedagError::ValidationFailure(_) | PipedagError::BuildFailure(_) => true,
            PipedagError::TaskExecution { source, .. } => matches!(
                source.downcast_ref::<PipedagError>(),
                Some(PipedagError::ValidationFailure(_) | PipedagError::BuildFailure(_))
            ),
            _ => false,
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, PipedagError>;
