// src/pipeline/driver.rs

//! Pipeline driver: runs the fixed phase sequence on one orchestrator.
//!
//! Phases run strictly one after another. Within a phase the mode decides
//! between the single-task executor (sequential) and the batch scheduler
//! (bounded-parallel); the policy decides whether failures stop the run.
//! Status lines go to the provided writer (stdout in production) so they
//! stay separate from the tracing output on stderr.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::model::{ConfigFile, StepAction};
use crate::engine::{Orchestrator, OrchestratorOptions};
use crate::errors::Result;
use crate::exec::failure_message;
use crate::fs::FileSystem;
use crate::pipeline::phase::{Phase, PhaseKind, PhaseReport, PhaseStatus};
use crate::pipeline::steps::{CommandFailure, StepTask};
use crate::pipeline::units::resolve_units;
use crate::types::{ExecutionMode, FailurePolicy, TaskId};

/// Task id of the publish step used when `[publish]` is not configured.
pub const DEFAULT_PUBLISH_ID: &str = "publish";

/// Outcome of a whole pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineReport {
    /// One report per phase, in execution order (skipped phases included).
    pub phases: Vec<PhaseReport>,
    /// The strict phase that stopped the run, if any.
    pub aborted_at: Option<PhaseKind>,
}

impl PipelineReport {
    pub fn success(&self) -> bool {
        self.aborted_at.is_none()
    }

    /// Process exit code: 0 on success, 1 if a strict phase failed.
    pub fn exit_code(&self) -> i32 {
        if self.success() { 0 } else { 1 }
    }

    pub fn phase(&self, kind: PhaseKind) -> Option<&PhaseReport> {
        self.phases.iter().find(|p| p.kind == kind)
    }
}

#[derive(Debug)]
pub struct PipelineDriver {
    cfg: ConfigFile,
    fs: Arc<dyn FileSystem>,
    root: PathBuf,
    orchestrator: Orchestrator,
}

impl PipelineDriver {
    /// Create a driver whose relative paths and commands resolve against
    /// `root`.
    pub fn new(cfg: ConfigFile, fs: Arc<dyn FileSystem>, root: impl Into<PathBuf>) -> Self {
        let orchestrator = Orchestrator::new(OrchestratorOptions {
            workers: cfg.config.workers,
            reexecution: cfg.config.reexecution,
        });

        Self {
            cfg,
            fs,
            root: root.into(),
            orchestrator,
        }
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn into_orchestrator(self) -> Orchestrator {
        self.orchestrator
    }

    fn extraction_policy(&self) -> FailurePolicy {
        self.cfg.config.extraction_policy
    }

    fn step_task(&self, kind: PhaseKind, id: &str, action: StepAction) -> StepTask {
        let on_failure = match kind {
            PhaseKind::Assembly | PhaseKind::Publish => CommandFailure::Build,
            _ => CommandFailure::Task,
        };
        StepTask::new(id, action, self.root.clone(), on_failure, Arc::clone(&self.fs))
    }

    /// Register every statically declared step plus the default publish step.
    fn register_static_steps(&self) -> Result<()> {
        // Both iterate phases in order and steps in declaration order.
        for ((kind, step), (id, deps)) in self.cfg.all_steps().zip(self.cfg.step_dependencies()) {
            let task = self.step_task(kind, &step.id, step.action.clone());
            self.orchestrator.register(id, task, deps)?;
        }

        if self.cfg.publish.is_none() {
            let task = self.step_task(
                PhaseKind::Publish,
                DEFAULT_PUBLISH_ID,
                StepAction::Note {
                    message: "no publish step configured; nothing to deploy".to_string(),
                },
            );
            self.orchestrator
                .register(DEFAULT_PUBLISH_ID, task, Vec::<TaskId>::new())?;
        }

        Ok(())
    }

    /// Resolve generation units and register one task per unit.
    fn register_generation(&self) -> anyhow::Result<Vec<TaskId>> {
        let Some(generation) = &self.cfg.generation else {
            return Ok(Vec::new());
        };

        let units = resolve_units(generation, self.fs.as_ref(), &self.root)?;
        let mut deps: Vec<TaskId> = self
            .cfg
            .last_outline_step()
            .map(|s| vec![s.to_string()])
            .unwrap_or_default();
        for dep in &generation.after {
            if !deps.contains(dep) {
                deps.push(dep.clone());
            }
        }

        let mut ids = Vec::with_capacity(units.len());
        for unit in units {
            let id = unit.task_id();
            if !self.orchestrator.is_registered(&id) {
                let action = StepAction::Command {
                    cmd: unit.render(&generation.cmd),
                    cwd: generation.cwd.clone(),
                };
                let task = self.step_task(PhaseKind::Generation, &id, action);
                self.orchestrator.register(id.clone(), task, deps.clone())?;
            }
            ids.push(id);
        }

        Ok(ids)
    }

    fn static_ids(&self, kind: PhaseKind) -> Vec<TaskId> {
        match kind {
            PhaseKind::Publish if self.cfg.publish.is_none() => vec![DEFAULT_PUBLISH_ID.to_string()],
            _ => self.cfg.steps(kind).iter().map(|s| s.id.clone()).collect(),
        }
    }

    /// Run every phase in order, writing status lines to `out`.
    pub async fn run(&self, out: &mut dyn Write) -> Result<PipelineReport> {
        writeln!(out, "Starting content pipeline...")?;
        self.register_static_steps()?;

        let mut phases = Vec::with_capacity(PhaseKind::ALL.len());
        let mut aborted_at: Option<PhaseKind> = None;

        for kind in PhaseKind::ALL {
            if let Some(failed) = aborted_at {
                let total = self.static_ids(kind).len();
                writeln!(
                    out,
                    "[SKIPPED] {}. {} - not run after {} failure",
                    kind.number(),
                    kind,
                    failed
                )?;
                phases.push(PhaseReport::skipped(kind, total));
                continue;
            }

            let policy = kind.policy(self.extraction_policy());
            writeln!(out)?;
            writeln!(out, "{}. {} ({}, {})", kind.number(), kind, kind.mode(), policy)?;

            let ids = if kind == PhaseKind::Generation {
                match self.register_generation() {
                    Ok(ids) => ids,
                    Err(err) => {
                        let report = self.unplannable_phase(kind, policy, &err, out)?;
                        if report.status == PhaseStatus::Failed {
                            aborted_at = Some(kind);
                        }
                        phases.push(report);
                        continue;
                    }
                }
            } else {
                self.static_ids(kind)
            };

            if ids.is_empty() {
                writeln!(out, "[SKIPPED] {} - no steps configured", kind)?;
                phases.push(PhaseReport::skipped(kind, 0));
                continue;
            }

            let phase = Phase::new(kind, ids, self.extraction_policy());
            let report = self.run_phase(&phase, out).await?;
            if report.status == PhaseStatus::Failed {
                aborted_at = Some(kind);
            }
            phases.push(report);
        }

        writeln!(out)?;
        match aborted_at {
            None => writeln!(out, "Pipeline completed successfully!")?,
            Some(kind) => writeln!(out, "Pipeline stopped: {} phase failed", kind)?,
        }

        Ok(PipelineReport { phases, aborted_at })
    }

    fn unplannable_phase(
        &self,
        kind: PhaseKind,
        policy: FailurePolicy,
        err: &anyhow::Error,
        out: &mut dyn Write,
    ) -> Result<PhaseReport> {
        warn!(phase = %kind, error = %format!("{err:#}"), "could not plan phase");
        writeln!(out, "[FAILED] {} - could not plan tasks: {:#}", kind, err)?;

        let status = match policy {
            FailurePolicy::Strict => PhaseStatus::Failed,
            FailurePolicy::Tolerant => PhaseStatus::Degraded,
        };
        Ok(PhaseReport {
            kind,
            status,
            total: 0,
            succeeded: Vec::new(),
            failed: vec![(kind.config_key().to_string(), format!("{err:#}"))],
        })
    }

    async fn run_phase(&self, phase: &Phase, out: &mut dyn Write) -> Result<PhaseReport> {
        info!(
            phase = %phase.kind,
            tasks = phase.task_ids.len(),
            mode = %phase.mode,
            policy = ?phase.policy,
            "phase started"
        );

        let mut succeeded = Vec::new();
        let mut failed = Vec::new();

        match phase.mode {
            ExecutionMode::Sequential => {
                for id in &phase.task_ids {
                    match self.orchestrator.execute(id).await {
                        Ok(_) => {
                            writeln!(out, "[SUCCESS] {} - {} completed", phase.kind, id)?;
                            succeeded.push(id.clone());
                        }
                        Err(err) => {
                            let message = failure_message(&err);
                            writeln!(out, "[FAILED] {} - {} failed: {}", phase.kind, id, message)?;
                            failed.push((id.clone(), message));
                            if phase.policy == FailurePolicy::Strict {
                                break;
                            }
                        }
                    }
                }
            }
            ExecutionMode::BoundedParallel => {
                let batch = self.orchestrator.execute_batch(&phase.task_ids).await;
                for id in &phase.task_ids {
                    if batch.results.contains_key(id) && !succeeded.contains(id) {
                        writeln!(out, "[SUCCESS] {} - {} completed", phase.kind, id)?;
                        succeeded.push(id.clone());
                    }
                }
                for (id, message) in batch.failed {
                    writeln!(out, "[FAILED] {} - {} failed: {}", phase.kind, id, message)?;
                    failed.push((id, message));
                }
            }
        }

        let total = phase.task_ids.len();
        let status = match (failed.is_empty(), phase.policy) {
            (true, _) => PhaseStatus::Passed,
            (false, FailurePolicy::Tolerant) => PhaseStatus::Degraded,
            (false, FailurePolicy::Strict) => PhaseStatus::Failed,
        };

        let report = PhaseReport {
            kind: phase.kind,
            status,
            total,
            succeeded,
            failed,
        };

        writeln!(out, "{}: {}", phase.kind, report.summary())?;
        info!(phase = %phase.kind, summary = %report.summary(), ?status, "phase finished");

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::RawConfigFile;
    use crate::fs::mock::MockFileSystem;
    use crate::types::TaskStatus;

    fn driver(src: &str, fs: &MockFileSystem) -> PipelineDriver {
        let raw: RawConfigFile = toml::from_str(src).unwrap();
        let cfg = ConfigFile::try_from(raw).unwrap();
        PipelineDriver::new(cfg, Arc::new(fs.clone()), ".")
    }

    async fn run(driver: &PipelineDriver) -> (PipelineReport, String) {
        let mut out = Vec::new();
        let report = driver.run(&mut out).await.unwrap();
        (report, String::from_utf8(out).unwrap())
    }

    #[tokio::test]
    async fn all_phases_pass_with_default_publish() {
        let fs = MockFileSystem::new();
        fs.add_dir("./book");
        let driver = driver(
            r#"
[[extraction]]
id = "pdf"
kind = "note"
message = "extract"

[[outline]]
id = "outline"
kind = "note"
message = "outline"

[[validation]]
id = "structure"
kind = "check_structure"
dirs = ["book"]
"#,
            &fs,
        );

        let (report, out) = run(&driver).await;

        assert!(report.success());
        assert_eq!(report.exit_code(), 0);
        assert_eq!(
            driver.orchestrator().get_status(DEFAULT_PUBLISH_ID).unwrap(),
            TaskStatus::Completed
        );
        assert!(out.contains("[SUCCESS] Validation - structure completed"));
        assert!(out.contains("[SKIPPED] Generation - no steps configured"));
        assert!(out.trim_end().ends_with("Pipeline completed successfully!"));
    }

    #[tokio::test]
    async fn strict_validation_failure_skips_publish() {
        let fs = MockFileSystem::new();
        let driver = driver(
            r#"
[[validation]]
id = "structure"
kind = "check_structure"
dirs = ["book/docs"]

[publish]
id = "deploy"
kind = "note"
message = "deploy"
"#,
            &fs,
        );

        let (report, out) = run(&driver).await;

        assert_eq!(report.aborted_at, Some(PhaseKind::Validation));
        assert_eq!(report.exit_code(), 1);
        assert_eq!(
            report.phase(PhaseKind::Publish).unwrap().status,
            PhaseStatus::Skipped
        );
        assert_eq!(
            driver.orchestrator().get_status("deploy").unwrap(),
            TaskStatus::Pending
        );
        assert!(out.contains("[FAILED] Validation - structure failed: Validation failed: missing directory"));
        assert!(out.contains("[SKIPPED] 7. Publish"));
    }

    #[tokio::test]
    async fn unreadable_units_file_degrades_generation() {
        let fs = MockFileSystem::new();
        let driver = driver(
            r#"
[generation]
cmd = "gen {unit}"
units_file = "chapters.json"

[[assembly]]
id = "assemble"
kind = "note"
message = "assemble"
"#,
            &fs,
        );

        let (report, out) = run(&driver).await;

        assert!(report.success());
        assert_eq!(
            report.phase(PhaseKind::Generation).unwrap().status,
            PhaseStatus::Degraded
        );
        assert!(out.contains("[FAILED] Generation - could not plan tasks"));
        assert_eq!(
            driver.orchestrator().get_status("assemble").unwrap(),
            TaskStatus::Completed
        );
    }

    #[tokio::test]
    async fn sequential_phase_stops_at_first_strict_failure() {
        let fs = MockFileSystem::new();
        let driver = driver(
            r#"
[[validation]]
id = "first"
kind = "check_content"
dir = "book/docs"

[[validation]]
id = "second"
kind = "note"
message = "never runs"
"#,
            &fs,
        );

        let (report, _) = run(&driver).await;

        let validation = report.phase(PhaseKind::Validation).unwrap();
        assert_eq!(validation.failed.len(), 1);
        assert!(validation.succeeded.is_empty());
        assert_eq!(
            driver.orchestrator().get_status("second").unwrap(),
            TaskStatus::Pending
        );
    }
}
