// src/pipeline/steps.rs

//! Concrete pipeline steps.
//!
//! Each configured step becomes a [`StepTask`]: a [`StepAction`] plus the
//! context it needs (filesystem, base directory). Command steps run through
//! the shell; filesystem steps and checks run on the blocking pool.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use regex::{Regex, RegexBuilder};
use serde_json::json;
use tracing::{info, warn};

use crate::config::model::StepAction;
use crate::errors::PipedagError;
use crate::exec::command::run_shell;
use crate::exec::task::{Task, TaskFuture, TaskOutput};
use crate::fs::{collect_files_with_extension, copy_recursive, FileSystem};
use crate::types::TaskId;

/// How a failing command is classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandFailure {
    /// Plain task failure.
    Task,
    /// Assembly/publish step: non-zero exit or spawn error is a `BuildFailure`.
    Build,
}

#[derive(Clone)]
pub struct StepTask {
    id: TaskId,
    action: StepAction,
    root: PathBuf,
    on_failure: CommandFailure,
    fs: Arc<dyn FileSystem>,
}

impl fmt::Debug for StepTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepTask")
            .field("id", &self.id)
            .field("action", &self.action)
            .field("root", &self.root)
            .field("on_failure", &self.on_failure)
            .finish_non_exhaustive()
    }
}

impl StepTask {
    pub fn new(
        id: impl Into<TaskId>,
        action: StepAction,
        root: impl Into<PathBuf>,
        on_failure: CommandFailure,
        fs: Arc<dyn FileSystem>,
    ) -> Self {
        Self {
            id: id.into(),
            action,
            root: root.into(),
            on_failure,
            fs,
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        self.root.join(path)
    }

    async fn run_command(self, cmd: String, cwd: Option<PathBuf>) -> Result<TaskOutput> {
        let dir = match &cwd {
            Some(dir) => self.resolve(dir),
            None => self.root.clone(),
        };

        let output = match run_shell(&self.id, &cmd, &dir).await {
            Ok(output) => output,
            Err(err) if self.on_failure == CommandFailure::Build => {
                return Err(PipedagError::BuildFailure(format!(
                    "step '{}' could not run: {err:#}",
                    self.id
                ))
                .into());
            }
            Err(err) => return Err(err),
        };

        if !output.success {
            let message = format!("step '{}' exited with code {}", self.id, output.exit_code);
            return Err(match self.on_failure {
                CommandFailure::Build => PipedagError::BuildFailure(message).into(),
                CommandFailure::Task => anyhow!(message),
            });
        }

        Ok(json!({
            "exit_code": output.exit_code,
            "stdout": output.stdout.trim_end(),
            "stdout_truncated": output.stdout_truncated,
        }))
    }

    fn run_blocking_action(&self) -> Result<TaskOutput> {
        let fs = self.fs.as_ref();
        match &self.action {
            StepAction::Command { .. } => Err(anyhow!("command steps run asynchronously")),
            StepAction::CopyTree { from, to } => copy_tree(fs, &self.resolve(from), &self.resolve(to)),
            StepAction::CopyAssets { from, to } => {
                copy_assets(fs, from.as_deref().map(|f| self.resolve(f)), &self.resolve(to))
            }
            StepAction::CheckStructure { dirs, files } => {
                let dirs: Vec<PathBuf> = dirs.iter().map(|d| self.resolve(d)).collect();
                let files: Vec<PathBuf> = files.iter().map(|f| self.resolve(f)).collect();
                check_structure(fs, &dirs, &files)
            }
            StepAction::CheckContent {
                dir,
                extension,
                min_chars,
            } => check_content(fs, &self.resolve(dir), extension, *min_chars),
            StepAction::CheckFormat {
                dir,
                extension,
                sections,
            } => check_format(fs, &self.resolve(dir), extension, sections),
            StepAction::Note { message } => {
                info!(step = %self.id, "{}", message);
                Ok(json!({ "message": message }))
            }
        }
    }
}

impl Task for StepTask {
    fn run(&self) -> TaskFuture {
        let step = self.clone();
        match &self.action {
            StepAction::Command { cmd, cwd } => {
                let (cmd, cwd) = (cmd.clone(), cwd.clone());
                Box::pin(step.run_command(cmd, cwd))
            }
            _ => Box::pin(async move {
                tokio::task::spawn_blocking(move || step.run_blocking_action())
                    .await
                    .map_err(|e| anyhow!("step did not finish: {e}"))?
            }),
        }
    }
}

fn validation_failure(message: String) -> anyhow::Error {
    PipedagError::ValidationFailure(message).into()
}

/// Move-to-destination: every top-level entry of `from` replaces the entry
/// of the same name under `to`.
fn copy_tree(fs: &dyn FileSystem, from: &Path, to: &Path) -> Result<TaskOutput> {
    if !fs.is_dir(from) {
        return Err(PipedagError::BuildFailure(format!(
            "source directory {} does not exist",
            from.display()
        ))
        .into());
    }

    fs.create_dir_all(to)?;
    let mut copied = 0usize;

    for entry in fs.read_dir(from)? {
        let Some(name) = entry.file_name() else {
            continue;
        };
        let dest = to.join(name);
        if fs.is_dir(&dest) {
            fs.remove_dir_all(&dest)?;
        } else if fs.exists(&dest) {
            fs.remove_file(&dest)?;
        }
        copy_recursive(fs, &entry, &dest)?;
        copied += 1;
    }

    info!(from = %from.display(), to = %to.display(), copied, "moved generated content");
    Ok(json!({ "copied": copied }))
}

fn copy_assets(fs: &dyn FileSystem, from: Option<PathBuf>, to: &Path) -> Result<TaskOutput> {
    fs.create_dir_all(to)?;

    let mut copied = 0usize;
    if let Some(from) = from {
        if fs.is_dir(&from) {
            for entry in fs.read_dir(&from)? {
                let Some(name) = entry.file_name() else {
                    continue;
                };
                copy_recursive(fs, &entry, &to.join(name))?;
                copied += 1;
            }
        } else {
            warn!(from = %from.display(), "asset source missing; only creating destination");
        }
    }

    info!(to = %to.display(), copied, "assets directory ready");
    Ok(json!({ "copied": copied }))
}

fn check_structure(fs: &dyn FileSystem, dirs: &[PathBuf], files: &[PathBuf]) -> Result<TaskOutput> {
    let mut missing = Vec::new();

    for dir in dirs {
        if !fs.is_dir(dir) {
            warn!(path = %dir.display(), "required directory missing");
            missing.push(format!("directory {}", dir.display()));
        }
    }
    for file in files {
        if !fs.is_file(file) {
            warn!(path = %file.display(), "expected file missing");
            missing.push(format!("file {}", file.display()));
        }
    }

    if !missing.is_empty() {
        return Err(validation_failure(format!("missing {}", missing.join(", "))));
    }

    Ok(json!({ "checked": dirs.len() + files.len() }))
}

fn check_content(fs: &dyn FileSystem, dir: &Path, extension: &str, min_chars: usize) -> Result<TaskOutput> {
    if !fs.is_dir(dir) {
        return Err(validation_failure(format!(
            "content directory {} does not exist",
            dir.display()
        )));
    }

    let files = collect_files_with_extension(fs, dir, extension)?;
    if files.is_empty() {
        return Err(validation_failure(format!(
            "no .{extension} files found in {}",
            dir.display()
        )));
    }

    let mut short = 0usize;
    for file in &files {
        let chars = fs.read_to_string(file)?.trim().chars().count();
        if chars < min_chars {
            short += 1;
            warn!(path = %file.display(), chars, min_chars, "file has very little content");
        }
    }

    info!(dir = %dir.display(), files = files.len(), "content integrity check passed");
    Ok(json!({ "files": files.len(), "short_files": short }))
}

fn check_format(fs: &dyn FileSystem, dir: &Path, extension: &str, sections: &[String]) -> Result<TaskOutput> {
    if !fs.is_dir(dir) {
        warn!(dir = %dir.display(), "no generated content found; skipping format check");
        return Ok(json!({ "files": 0 }));
    }

    let patterns: Vec<Regex> = sections
        .iter()
        .map(|p| RegexBuilder::new(p).multi_line(true).build())
        .collect::<std::result::Result<_, _>>()?;

    let files = collect_files_with_extension(fs, dir, extension)?;
    let mut problems = Vec::new();

    for file in &files {
        let content = fs.read_to_string(file)?;
        let missing: Vec<&str> = sections
            .iter()
            .zip(&patterns)
            .filter(|(_, re)| !re.is_match(&content))
            .map(|(pattern, _)| pattern.as_str())
            .collect();
        if !missing.is_empty() {
            problems.push(format!("{} lacks {}", file.display(), missing.join(", ")));
        }
    }

    if !problems.is_empty() {
        return Err(validation_failure(format!(
            "{} file(s) missing required sections: {}",
            problems.len(),
            problems.join("; ")
        )));
    }

    Ok(json!({ "files": files.len() }))
}
