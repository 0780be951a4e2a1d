// src/pipeline/phase.rs

//! Pipeline phases and their per-run reports.

use std::fmt;

use crate::types::{ExecutionMode, FailurePolicy, TaskId};

/// The fixed, ordered steps of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PhaseKind {
    Extraction,
    Outline,
    Generation,
    FormatCheck,
    Assembly,
    Validation,
    Publish,
}

impl PhaseKind {
    /// Every phase in execution order.
    pub const ALL: [PhaseKind; 7] = [
        PhaseKind::Extraction,
        PhaseKind::Outline,
        PhaseKind::Generation,
        PhaseKind::FormatCheck,
        PhaseKind::Assembly,
        PhaseKind::Validation,
        PhaseKind::Publish,
    ];

    pub fn title(self) -> &'static str {
        match self {
            PhaseKind::Extraction => "Extraction",
            PhaseKind::Outline => "Outline",
            PhaseKind::Generation => "Generation",
            PhaseKind::FormatCheck => "Format check",
            PhaseKind::Assembly => "Assembly",
            PhaseKind::Validation => "Validation",
            PhaseKind::Publish => "Publish",
        }
    }

    /// Name of the TOML section declaring this phase's steps.
    pub fn config_key(self) -> &'static str {
        match self {
            PhaseKind::Extraction => "extraction",
            PhaseKind::Outline => "outline",
            PhaseKind::Generation => "generation",
            PhaseKind::FormatCheck => "format",
            PhaseKind::Assembly => "assembly",
            PhaseKind::Validation => "validation",
            PhaseKind::Publish => "publish",
        }
    }

    pub fn mode(self) -> ExecutionMode {
        match self {
            PhaseKind::Extraction | PhaseKind::Generation => ExecutionMode::BoundedParallel,
            _ => ExecutionMode::Sequential,
        }
    }

    /// Failure policy for this phase. Only extraction is configurable;
    /// generation is always tolerant and everything else strict.
    pub fn policy(self, extraction_policy: FailurePolicy) -> FailurePolicy {
        match self {
            PhaseKind::Extraction => extraction_policy,
            PhaseKind::Generation => FailurePolicy::Tolerant,
            _ => FailurePolicy::Strict,
        }
    }

    /// Whether each step implicitly depends on the previous step of the
    /// same phase.
    pub fn is_chained(self) -> bool {
        matches!(self, PhaseKind::Outline | PhaseKind::Assembly)
    }

    /// Position in [`PhaseKind::ALL`], 1-based for display.
    pub fn number(self) -> usize {
        PhaseKind::ALL
            .iter()
            .position(|k| *k == self)
            .map(|i| i + 1)
            .unwrap_or(0)
    }
}

impl fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// A planned phase: which tasks to run and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Phase {
    pub kind: PhaseKind,
    pub task_ids: Vec<TaskId>,
    pub mode: ExecutionMode,
    pub policy: FailurePolicy,
}

impl Phase {
    pub fn new(kind: PhaseKind, task_ids: Vec<TaskId>, extraction_policy: FailurePolicy) -> Self {
        Self {
            kind,
            task_ids,
            mode: kind.mode(),
            policy: kind.policy(extraction_policy),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseStatus {
    /// Every task succeeded.
    Passed,
    /// Some tasks failed under a tolerant policy; the pipeline continued.
    Degraded,
    /// A task failed under a strict policy; the pipeline stopped here.
    Failed,
    /// The phase did not run (nothing configured, or an earlier strict
    /// failure).
    Skipped,
}

/// Outcome of one phase of a pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseReport {
    pub kind: PhaseKind,
    pub status: PhaseStatus,
    /// Number of tasks the phase planned to run.
    pub total: usize,
    /// Successful task ids, in planning order.
    pub succeeded: Vec<TaskId>,
    /// Failed task ids with their error messages.
    pub failed: Vec<(TaskId, String)>,
}

impl PhaseReport {
    pub fn skipped(kind: PhaseKind, total: usize) -> Self {
        Self {
            kind,
            status: PhaseStatus::Skipped,
            total,
            succeeded: Vec::new(),
            failed: Vec::new(),
        }
    }

    /// `"k/N succeeded"`.
    pub fn summary(&self) -> String {
        format!("{}/{} succeeded", self.succeeded.len(), self.total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_policies() {
        assert_eq!(
            PhaseKind::Extraction.policy(FailurePolicy::Tolerant),
            FailurePolicy::Tolerant
        );
        assert_eq!(
            PhaseKind::Generation.policy(FailurePolicy::Strict),
            FailurePolicy::Tolerant
        );
        assert_eq!(
            PhaseKind::Validation.policy(FailurePolicy::Tolerant),
            FailurePolicy::Strict
        );
    }

    #[test]
    fn numbering_follows_execution_order() {
        assert_eq!(PhaseKind::Extraction.number(), 1);
        assert_eq!(PhaseKind::Publish.number(), 7);
    }
}
