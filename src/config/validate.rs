// src/config/validate.rs

use std::collections::HashMap;

use regex::RegexBuilder;

use crate::config::model::{ConfigFile, RawConfigFile, StepAction};
use crate::dag::DagGraph;
use crate::errors::{PipedagError, Result};
use crate::pipeline::driver::DEFAULT_PUBLISH_ID;
use crate::pipeline::phase::PhaseKind;
use crate::pipeline::units::GENERATION_PREFIX;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::PipedagError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw))
    }
}

/// Re-run validation on an already built config (e.g. after CLI overrides).
pub fn validate_config(cfg: &ConfigFile) -> Result<()> {
    validate_raw_config(cfg)
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_steps(cfg)?;
    validate_global_config(cfg)?;
    let phases = validate_step_ids(cfg)?;
    validate_step_dependencies(cfg, &phases)?;
    validate_generation(cfg, &phases)?;
    validate_step_actions(cfg)?;
    validate_dag(cfg)?;
    Ok(())
}

fn ensure_has_steps(cfg: &RawConfigFile) -> Result<()> {
    if cfg.all_steps().next().is_none() && cfg.generation.is_none() {
        return Err(PipedagError::ConfigError(
            "config must declare at least one pipeline step".to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    if cfg.config.workers == 0 {
        return Err(PipedagError::ConfigError(
            "[config].workers must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

/// Check id shape and uniqueness; returns id -> phase.
fn validate_step_ids(cfg: &RawConfigFile) -> Result<HashMap<&str, PhaseKind>> {
    let mut phases: HashMap<&str, PhaseKind> = HashMap::new();

    for (kind, step) in cfg.all_steps() {
        if step.id.trim().is_empty() {
            return Err(PipedagError::ConfigError(format!(
                "a step in [{}] has an empty id",
                kind.config_key()
            )));
        }
        if step.id.starts_with(GENERATION_PREFIX) {
            return Err(PipedagError::ConfigError(format!(
                "step id '{}' uses the reserved prefix '{}'",
                step.id, GENERATION_PREFIX
            )));
        }
        if step.id == DEFAULT_PUBLISH_ID && cfg.publish.is_none() {
            return Err(PipedagError::ConfigError(format!(
                "step id '{DEFAULT_PUBLISH_ID}' is reserved for the default publish step"
            )));
        }
        if let Some(existing) = phases.insert(step.id.as_str(), kind) {
            return Err(PipedagError::ConfigError(format!(
                "duplicate step id '{}' (in [{}] and [{}])",
                step.id,
                existing.config_key(),
                kind.config_key()
            )));
        }
    }

    Ok(phases)
}

fn validate_step_dependencies(cfg: &RawConfigFile, phases: &HashMap<&str, PhaseKind>) -> Result<()> {
    for kind in PhaseKind::ALL {
        let steps = cfg.steps(kind);
        for (index, step) in steps.iter().enumerate() {
            for dep in &step.after {
                if dep == &step.id {
                    return Err(PipedagError::ConfigError(format!(
                        "step '{}' cannot depend on itself in `after`",
                        step.id
                    )));
                }
                check_dependency_phase(&step.id, kind, dep, phases)?;

                // A sequential phase runs steps in declaration order, so a
                // same-phase dependency must be declared first.
                let declared_later = steps[index + 1..].iter().any(|s| &s.id == dep);
                if declared_later {
                    return Err(PipedagError::ConfigError(format!(
                        "step '{}' in [{}] depends on '{}', which is declared after it",
                        step.id,
                        kind.config_key(),
                        dep
                    )));
                }
            }
        }
    }
    Ok(())
}

/// A dependency must be known and live in an earlier phase or in the same
/// sequential phase.
fn check_dependency_phase(
    id: &str,
    kind: PhaseKind,
    dep: &str,
    phases: &HashMap<&str, PhaseKind>,
) -> Result<()> {
    let Some(dep_kind) = phases.get(dep).copied() else {
        return Err(PipedagError::ConfigError(format!(
            "step '{id}' has unknown dependency '{dep}' in `after`"
        )));
    };

    if dep_kind > kind {
        return Err(PipedagError::ConfigError(format!(
            "step '{id}' in [{}] depends on '{dep}' from the later phase [{}]",
            kind.config_key(),
            dep_kind.config_key()
        )));
    }

    if dep_kind == kind && kind.mode() == crate::types::ExecutionMode::BoundedParallel {
        return Err(PipedagError::ConfigError(format!(
            "step '{id}' depends on '{dep}' inside the parallel phase [{}]",
            kind.config_key()
        )));
    }

    Ok(())
}

fn validate_generation(cfg: &RawConfigFile, phases: &HashMap<&str, PhaseKind>) -> Result<()> {
    let Some(generation) = &cfg.generation else {
        return Ok(());
    };

    if generation.units.is_some() && generation.units_file.is_some() {
        return Err(PipedagError::ConfigError(
            "[generation] must set at most one of `units` and `units_file`".to_string(),
        ));
    }

    let many_units = generation.units_file.is_some()
        || generation.units.as_ref().is_some_and(|u| u.len() > 1);
    if many_units && !generation.cmd.contains("{unit}") {
        return Err(PipedagError::ConfigError(
            "[generation].cmd must contain `{unit}` when more than one unit is generated"
                .to_string(),
        ));
    }

    for dep in &generation.after {
        check_dependency_phase("[generation]", PhaseKind::Generation, dep, phases)?;
    }

    Ok(())
}

fn validate_step_actions(cfg: &RawConfigFile) -> Result<()> {
    for (_, step) in cfg.all_steps() {
        match &step.action {
            StepAction::Command { cmd, .. } if cmd.trim().is_empty() => {
                return Err(PipedagError::ConfigError(format!(
                    "step '{}' has an empty `cmd`",
                    step.id
                )));
            }
            StepAction::CheckFormat { sections, .. } => {
                for pattern in sections {
                    RegexBuilder::new(pattern)
                        .multi_line(true)
                        .build()
                        .map_err(|e| {
                            PipedagError::ConfigError(format!(
                                "step '{}' has an invalid section pattern '{}': {}",
                                step.id, pattern, e
                            ))
                        })?;
                }
            }
            _ => {}
        }
    }
    Ok(())
}

fn validate_dag(cfg: &RawConfigFile) -> Result<()> {
    let graph = DagGraph::from_dependencies(cfg.step_dependencies());
    graph.topological_order().map(|_| ()).map_err(|node| {
        PipedagError::DagCycle(format!(
            "cycle detected in step dependencies involving step '{}'",
            node
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> Result<ConfigFile> {
        let raw: RawConfigFile = toml::from_str(src)?;
        ConfigFile::try_from(raw)
    }

    #[test]
    fn empty_config_is_rejected() {
        assert!(matches!(parse(""), Err(PipedagError::ConfigError(_))));
    }

    #[test]
    fn zero_workers_is_rejected() {
        let err = parse(
            r#"
[config]
workers = 0

[[extraction]]
id = "a"
kind = "note"
message = "a"
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("workers"));
    }

    #[test]
    fn duplicate_ids_across_phases_are_rejected() {
        let err = parse(
            r#"
[[extraction]]
id = "a"
kind = "note"
message = "a"

[[assembly]]
id = "a"
kind = "note"
message = "again"
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate step id 'a'"));
    }

    #[test]
    fn dependency_on_later_phase_is_rejected() {
        let err = parse(
            r#"
[[outline]]
id = "outline"
kind = "note"
message = "o"
after = ["check"]

[[validation]]
id = "check"
kind = "note"
message = "v"
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("later phase"));
    }

    #[test]
    fn same_phase_dependency_inside_parallel_phase_is_rejected() {
        let err = parse(
            r#"
[[extraction]]
id = "a"
kind = "note"
message = "a"

[[extraction]]
id = "b"
kind = "note"
message = "b"
after = ["a"]
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("parallel phase"));
    }

    #[test]
    fn mutual_dependencies_in_sequential_phase_are_rejected() {
        let err = parse(
            r#"
[[validation]]
id = "x"
kind = "note"
message = "x"
after = ["y"]

[[validation]]
id = "y"
kind = "note"
message = "y"
after = ["x"]
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("declared after it"));
    }

    #[test]
    fn backward_dependency_in_sequential_phase_is_accepted() {
        parse(
            r#"
[[format]]
id = "lint"
kind = "note"
message = "lint"

[[format]]
id = "headings"
kind = "note"
message = "headings"
after = ["lint"]
"#,
        )
        .unwrap();
    }

    #[test]
    fn generation_template_needs_placeholder() {
        let err = parse(
            r#"
[generation]
cmd = "echo generate"
units = ["a", "b"]
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("{unit}"));
    }

    #[test]
    fn invalid_section_pattern_is_rejected() {
        let err = parse(
            r#"
[[format]]
id = "fmt"
kind = "check_format"
dir = "book"
sections = ["(unclosed"]
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("invalid section pattern"));
    }
}
