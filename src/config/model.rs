// src/config/model.rs

use std::ops::Deref;
use std::path::PathBuf;

use serde::Deserialize;

use crate::exec::DEFAULT_WORKERS;
use crate::pipeline::phase::PhaseKind;
use crate::types::{FailurePolicy, ReexecutionPolicy};

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [config]
/// workers = 4
/// extraction_policy = "strict"
/// reexecution = "rerun"
/// task_log = "build/task_log.json"
///
/// [[extraction]]
/// id = "themes"
/// kind = "command"
/// cmd = "python extract.py themes"
///
/// [[outline]]
/// id = "global_outline"
/// kind = "command"
/// cmd = "python outline.py"
///
/// [generation]
/// cmd = "python generate.py {unit}"
/// units_file = "build/chapters.json"
///
/// [[validation]]
/// id = "structure"
/// kind = "check_structure"
/// dirs = ["book_output"]
/// ```
///
/// Every section is optional. Use [`ConfigFile::try_from`] (or
/// `config::load_and_validate`) to obtain a validated configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    /// Global behaviour config from `[config]`.
    #[serde(default)]
    pub config: ConfigSection,

    #[serde(default)]
    pub extraction: Vec<StepConfig>,

    #[serde(default)]
    pub outline: Vec<StepConfig>,

    #[serde(default)]
    pub generation: Option<GenerationConfig>,

    /// Optional format gate between generation and assembly (`[[format]]`).
    #[serde(default)]
    pub format: Vec<StepConfig>,

    #[serde(default)]
    pub assembly: Vec<StepConfig>,

    #[serde(default)]
    pub validation: Vec<StepConfig>,

    /// Terminal step. When absent the driver publishes with a plain note.
    #[serde(default)]
    pub publish: Option<StepConfig>,
}

impl RawConfigFile {
    /// Statically declared steps of a phase, in declaration order.
    ///
    /// Generation units are resolved at run time and are not included.
    pub fn steps(&self, kind: PhaseKind) -> &[StepConfig] {
        match kind {
            PhaseKind::Extraction => &self.extraction,
            PhaseKind::Outline => &self.outline,
            PhaseKind::Generation => &[],
            PhaseKind::FormatCheck => &self.format,
            PhaseKind::Assembly => &self.assembly,
            PhaseKind::Validation => &self.validation,
            PhaseKind::Publish => self.publish.as_slice(),
        }
    }

    /// All static steps, tagged with their phase, in pipeline order.
    pub fn all_steps(&self) -> impl Iterator<Item = (PhaseKind, &StepConfig)> {
        PhaseKind::ALL
            .into_iter()
            .flat_map(move |kind| self.steps(kind).iter().map(move |step| (kind, step)))
    }

    /// Effective dependencies of every static step: explicit `after`
    /// entries plus the implicit link to the previous step in chained phases.
    pub fn step_dependencies(&self) -> Vec<(String, Vec<String>)> {
        let mut out = Vec::new();
        for kind in PhaseKind::ALL {
            let mut previous: Option<&str> = None;
            for step in self.steps(kind) {
                let mut deps = Vec::new();
                if kind.is_chained() {
                    if let Some(prev) = previous {
                        deps.push(prev.to_string());
                    }
                }
                for dep in &step.after {
                    if !deps.contains(dep) {
                        deps.push(dep.clone());
                    }
                }
                out.push((step.id.clone(), deps));
                previous = Some(step.id.as_str());
            }
        }
        out
    }

    /// Id of the last outline step; generation units depend on it.
    pub fn last_outline_step(&self) -> Option<&str> {
        self.outline.last().map(|s| s.id.as_str())
    }
}

/// A validated configuration.
///
/// Only constructible through `TryFrom<RawConfigFile>` (see
/// `config::validate`), so holders can rely on ids being unique, references
/// resolving and the dependency graph being acyclic.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    raw: RawConfigFile,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        Self { raw }
    }

    /// Mutable access to the global section, for CLI overrides.
    pub fn config_mut(&mut self) -> &mut ConfigSection {
        &mut self.raw.config
    }
}

impl Deref for ConfigFile {
    type Target = RawConfigFile;

    fn deref(&self) -> &Self::Target {
        &self.raw
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Worker-pool bound for bounded-parallel phases.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// `"strict"` (default) or `"tolerant"`.
    #[serde(default)]
    pub extraction_policy: FailurePolicy,

    /// `"rerun"` (default), `"reject"` or `"memoize"`.
    #[serde(default)]
    pub reexecution: ReexecutionPolicy,

    /// Where to write the execution log after the run, if anywhere.
    #[serde(default)]
    pub task_log: Option<PathBuf>,

    /// Base directory for every relative path and command in the pipeline.
    /// Relative values are resolved against the config file's directory.
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
}

fn default_workers() -> usize {
    DEFAULT_WORKERS
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            extraction_policy: FailurePolicy::default(),
            reexecution: ReexecutionPolicy::default(),
            task_log: None,
            working_dir: None,
        }
    }
}

/// One `[[<phase>]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct StepConfig {
    /// Unique task id across the whole pipeline.
    pub id: String,

    /// Extra dependencies on steps of the same or earlier phases.
    #[serde(default)]
    pub after: Vec<String>,

    #[serde(flatten)]
    pub action: StepAction,
}

/// What a step does, selected by its `kind` field.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepAction {
    /// Run a shell command; non-zero exit fails the step.
    Command {
        cmd: String,
        #[serde(default)]
        cwd: Option<PathBuf>,
    },
    /// Replace each top-level entry of `to` with the matching entry of `from`.
    CopyTree { from: PathBuf, to: PathBuf },
    /// Ensure `to` exists and copy `from` into it when given.
    CopyAssets {
        #[serde(default)]
        from: Option<PathBuf>,
        to: PathBuf,
    },
    /// Fail unless every listed directory and file exists.
    CheckStructure {
        #[serde(default)]
        dirs: Vec<PathBuf>,
        #[serde(default)]
        files: Vec<PathBuf>,
    },
    /// Fail unless `dir` holds at least one file with `extension`.
    CheckContent {
        dir: PathBuf,
        #[serde(default = "default_extension")]
        extension: String,
        /// Files shorter than this are reported as warnings only.
        #[serde(default = "default_min_chars")]
        min_chars: usize,
    },
    /// Fail if any file with `extension` under `dir` lacks one of the
    /// required section patterns (multi-line regexes).
    CheckFormat {
        dir: PathBuf,
        #[serde(default = "default_extension")]
        extension: String,
        sections: Vec<String>,
    },
    /// Report a message and succeed.
    Note { message: String },
}

impl StepAction {
    /// The `kind` tag as written in the config file.
    pub fn kind(&self) -> &'static str {
        match self {
            StepAction::Command { .. } => "command",
            StepAction::CopyTree { .. } => "copy_tree",
            StepAction::CopyAssets { .. } => "copy_assets",
            StepAction::CheckStructure { .. } => "check_structure",
            StepAction::CheckContent { .. } => "check_content",
            StepAction::CheckFormat { .. } => "check_format",
            StepAction::Note { .. } => "note",
        }
    }
}

fn default_extension() -> String {
    "mdx".to_string()
}

fn default_min_chars() -> usize {
    100
}

/// `[generation]` section: one task per content unit.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationConfig {
    /// Command template. `{unit}` is replaced by the unit id and `{title}`
    /// by its title.
    pub cmd: String,

    /// Inline unit list.
    #[serde(default)]
    pub units: Option<Vec<String>>,

    /// JSON file (array of strings or of objects with `id`/`title`) read when
    /// the phase starts, typically produced by the outline phase.
    #[serde(default)]
    pub units_file: Option<PathBuf>,

    #[serde(default)]
    pub cwd: Option<PathBuf>,

    /// Extra dependencies for every unit, on top of the last outline step.
    #[serde(default)]
    pub after: Vec<String>,
}
