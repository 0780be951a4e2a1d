// src/pipeline/units.rs

//! Generation units: one generation task per content unit.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::config::model::GenerationConfig;
use crate::fs::FileSystem;
use crate::types::TaskId;

/// Prefix of every generation task id; reserved for generated tasks.
pub const GENERATION_PREFIX: &str = "generate:";

/// A content unit to generate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationUnit {
    /// Slug used in the task id and the `{unit}` placeholder.
    pub id: String,
    /// Human-readable title, used for `{title}`.
    pub title: String,
}

impl GenerationUnit {
    pub fn new(raw: &str) -> Self {
        Self {
            id: slug(raw),
            title: raw.to_string(),
        }
    }

    pub fn task_id(&self) -> TaskId {
        format!("{GENERATION_PREFIX}{}", self.id)
    }

    /// Substitute `{unit}` and `{title}` in a command template.
    pub fn render(&self, template: &str) -> String {
        template
            .replace("{unit}", &self.id)
            .replace("{title}", &self.title)
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum UnitSpec {
    Name(String),
    Object {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        title: Option<String>,
    },
}

/// Lowercase ASCII alphanumerics; every other run of characters becomes `_`.
pub fn slug(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_sep = false;
    for c in raw.trim().chars() {
        if c.is_ascii_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.push(c.to_ascii_lowercase());
        } else {
            pending_sep = true;
        }
    }
    out
}

/// Resolve the units of the generation phase.
///
/// Inline `units` win; otherwise `units_file` is read (relative to `root`)
/// at the moment the phase starts. Units whose slug collides with an earlier
/// one are dropped.
pub fn resolve_units(
    cfg: &GenerationConfig,
    fs: &dyn FileSystem,
    root: &Path,
) -> Result<Vec<GenerationUnit>> {
    let mut units: Vec<GenerationUnit> = match (&cfg.units, &cfg.units_file) {
        (Some(inline), _) => inline.iter().map(|u| GenerationUnit::new(u)).collect(),
        (None, Some(file)) => {
            let path = root.join(file);
            let contents = fs
                .read_to_string(&path)
                .with_context(|| format!("reading generation units from {}", path.display()))?;
            parse_units(&contents)
                .with_context(|| format!("parsing generation units in {}", path.display()))?
        }
        (None, None) => vec![GenerationUnit::new("default")],
    };

    let mut seen = std::collections::HashSet::new();
    units.retain(|u| !u.id.is_empty() && seen.insert(u.id.clone()));
    Ok(units)
}

fn parse_units(contents: &str) -> Result<Vec<GenerationUnit>> {
    let specs: Vec<UnitSpec> = serde_json::from_str(contents)?;
    let mut units = Vec::with_capacity(specs.len());

    for spec in specs {
        let unit = match spec {
            UnitSpec::Name(name) => GenerationUnit::new(&name),
            UnitSpec::Object { id, title } => match (id, title) {
                (Some(id), Some(title)) => GenerationUnit {
                    id: slug(&id),
                    title,
                },
                (Some(id), None) => GenerationUnit::new(&id),
                (None, Some(title)) => GenerationUnit::new(&title),
                (None, None) => anyhow::bail!("generation unit needs an `id` or a `title`"),
            },
        };
        units.push(unit);
    }

    Ok(units)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    fn generation(units: Option<Vec<&str>>, units_file: Option<&str>) -> GenerationConfig {
        GenerationConfig {
            cmd: "gen {unit}".to_string(),
            units: units.map(|u| u.into_iter().map(String::from).collect()),
            units_file: units_file.map(Into::into),
            cwd: None,
            after: vec![],
        }
    }

    #[test]
    fn slugs_titles() {
        assert_eq!(slug("Chapter 1: ROS 2 Basics"), "chapter_1_ros_2_basics");
        assert_eq!(slug("  --Intro--  "), "intro");
    }

    #[test]
    fn renders_placeholders() {
        let unit = GenerationUnit::new("Week 3");
        assert_eq!(unit.task_id(), "generate:week_3");
        assert_eq!(unit.render("gen {unit} '{title}'"), "gen week_3 'Week 3'");
    }

    #[test]
    fn reads_units_file_with_mixed_entries() {
        let fs = MockFileSystem::new();
        fs.add_file(
            "./build/chapters.json",
            r#"["Intro", {"title": "Sensors"}, {"id": "ch3", "title": "Actuators"}, "intro"]"#,
        );

        let units = resolve_units(
            &generation(None, Some("build/chapters.json")),
            &fs,
            Path::new("."),
        )
        .unwrap();

        let ids: Vec<_> = units.iter().map(|u| u.id.as_str()).collect();
        assert_eq!(ids, ["intro", "sensors", "ch3"]);
        assert_eq!(units[2].title, "Actuators");
    }

    #[test]
    fn missing_units_file_is_an_error() {
        let fs = MockFileSystem::new();
        let err = resolve_units(&generation(None, Some("nope.json")), &fs, Path::new("."))
            .unwrap_err();
        assert!(format!("{err:#}").contains("nope.json"));
    }

    #[test]
    fn inline_units_are_used_verbatim() {
        let fs = MockFileSystem::new();
        let units = resolve_units(&generation(Some(vec!["a", "b"]), None), &fs, Path::new("."))
            .unwrap();
        assert_eq!(units.len(), 2);
    }
}
