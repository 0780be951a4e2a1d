#![allow(dead_code)]

use std::path::PathBuf;

use pipedag::config::{ConfigFile, GenerationConfig, RawConfigFile, StepAction, StepConfig};
use pipedag::errors::Result;
use pipedag::types::{FailurePolicy, ReexecutionPolicy};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.config.config.workers = workers;
        self
    }

    pub fn extraction_policy(mut self, policy: FailurePolicy) -> Self {
        self.config.config.extraction_policy = policy;
        self
    }

    pub fn reexecution(mut self, policy: ReexecutionPolicy) -> Self {
        self.config.config.reexecution = policy;
        self
    }

    pub fn task_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.config.task_log = Some(path.into());
        self
    }

    pub fn extraction(mut self, step: StepConfig) -> Self {
        self.config.extraction.push(step);
        self
    }

    pub fn outline(mut self, step: StepConfig) -> Self {
        self.config.outline.push(step);
        self
    }

    /// Generation phase with one task per inline unit.
    pub fn generation(mut self, cmd: &str, units: &[&str]) -> Self {
        self.config.generation = Some(GenerationConfig {
            cmd: cmd.to_string(),
            units: Some(units.iter().map(|u| u.to_string()).collect()),
            units_file: None,
            cwd: None,
            after: vec![],
        });
        self
    }

    /// Generation phase reading its units from a JSON file at phase start.
    pub fn generation_from_file(mut self, cmd: &str, units_file: impl Into<PathBuf>) -> Self {
        self.config.generation = Some(GenerationConfig {
            cmd: cmd.to_string(),
            units: None,
            units_file: Some(units_file.into()),
            cwd: None,
            after: vec![],
        });
        self
    }

    pub fn format(mut self, step: StepConfig) -> Self {
        self.config.format.push(step);
        self
    }

    pub fn assembly(mut self, step: StepConfig) -> Self {
        self.config.assembly.push(step);
        self
    }

    pub fn validation(mut self, step: StepConfig) -> Self {
        self.config.validation.push(step);
        self
    }

    pub fn publish(mut self, step: StepConfig) -> Self {
        self.config.publish = Some(step);
        self
    }

    pub fn try_build(self) -> Result<ConfigFile> {
        ConfigFile::try_from(self.config)
    }

    pub fn build(self) -> ConfigFile {
        self.try_build()
            .expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `StepConfig`.
pub struct StepConfigBuilder {
    step: StepConfig,
}

impl StepConfigBuilder {
    pub fn new(id: &str, action: StepAction) -> Self {
        Self {
            step: StepConfig {
                id: id.to_string(),
                after: vec![],
                action,
            },
        }
    }

    pub fn command(id: &str, cmd: &str) -> Self {
        Self::new(
            id,
            StepAction::Command {
                cmd: cmd.to_string(),
                cwd: None,
            },
        )
    }

    pub fn note(id: &str, message: &str) -> Self {
        Self::new(
            id,
            StepAction::Note {
                message: message.to_string(),
            },
        )
    }

    pub fn check_structure(id: &str, dirs: &[&str]) -> Self {
        Self::new(
            id,
            StepAction::CheckStructure {
                dirs: dirs.iter().map(PathBuf::from).collect(),
                files: vec![],
            },
        )
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.step.after.push(dep.to_string());
        self
    }

    pub fn build(self) -> StepConfig {
        self.step
    }
}
