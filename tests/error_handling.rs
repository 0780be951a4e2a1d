// tests/error_handling.rs

use std::io::Write;
use tempfile::NamedTempFile;
use pipedag::config::load_and_validate;
use pipedag::errors::PipedagError;
use pipedag::types::ReexecutionPolicy;
use pipedag_test_utils::{ConfigFileBuilder, StepConfigBuilder};

fn write_config(src: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{src}").unwrap();
    file
}

#[test]
fn test_mutual_dependencies_are_rejected() {
    let file = write_config(
        r#"
[[validation]]
id = "A"
kind = "note"
message = "A"
after = ["B"]

[[validation]]
id = "B"
kind = "note"
message = "B"
after = ["A"]
"#,
    );

    match load_and_validate(file.path()) {
        Err(PipedagError::ConfigError(msg)) => {
            assert!(msg.contains("'A'"));
            assert!(msg.contains("declared after it"));
        }
        Err(e) => panic!("Expected ConfigError, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn test_dependency_on_later_step_in_same_phase_is_rejected() {
    // No cycle here, but `v1` could never pass the gate: validation runs
    // its steps in declaration order.
    let file = write_config(
        r#"
[[validation]]
id = "v1"
kind = "note"
message = "first"
after = ["v2"]

[[validation]]
id = "v2"
kind = "note"
message = "second"
"#,
    );

    match load_and_validate(file.path()) {
        Err(PipedagError::ConfigError(msg)) => {
            assert!(msg.contains("step 'v1' in [validation] depends on 'v2'"));
        }
        Err(e) => panic!("Expected ConfigError, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn test_unknown_dependency_returns_config_error() {
    let file = write_config(
        r#"
[[outline]]
id = "A"
kind = "command"
cmd = "echo A"
after = ["NonExistent"]
"#,
    );

    let result = load_and_validate(file.path());

    match result {
        Err(PipedagError::ConfigError(msg)) => {
            assert!(msg.contains("unknown dependency"));
            assert!(msg.contains("NonExistent"));
        }
        Err(e) => panic!("Expected ConfigError, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn test_unknown_step_kind_is_a_toml_error() {
    let file = write_config(
        r#"
[[assembly]]
id = "A"
kind = "teleport"
"#,
    );

    assert!(matches!(
        load_and_validate(file.path()),
        Err(PipedagError::TomlError(_))
    ));
}

#[test]
fn test_missing_file_is_an_io_error() {
    assert!(matches!(
        load_and_validate("/definitely/not/here/Pipedag.toml"),
        Err(PipedagError::IoError(_))
    ));
}

#[test]
fn test_reserved_ids_are_rejected() {
    let generated = ConfigFileBuilder::new()
        .extraction(StepConfigBuilder::note("generate:ch1", "x").build())
        .try_build();
    assert!(matches!(generated, Err(PipedagError::ConfigError(ref m)) if m.contains("reserved prefix")));

    let publish = ConfigFileBuilder::new()
        .validation(StepConfigBuilder::note("publish", "x").build())
        .try_build();
    assert!(matches!(publish, Err(PipedagError::ConfigError(ref m)) if m.contains("reserved")));

    let explicit_publish = ConfigFileBuilder::new()
        .publish(StepConfigBuilder::note("publish", "x").build())
        .try_build();
    assert!(explicit_publish.is_ok());
}

#[test]
fn test_generation_with_both_unit_sources_is_rejected() {
    let file = write_config(
        r#"
[generation]
cmd = "gen {unit}"
units = ["a"]
units_file = "units.json"
"#,
    );

    match load_and_validate(file.path()) {
        Err(PipedagError::ConfigError(msg)) => assert!(msg.contains("units_file")),
        other => panic!("Expected ConfigError, got: {:?}", other),
    }
}

#[test]
fn test_config_section_is_parsed() {
    let file = write_config(
        r#"
[config]
workers = 2
reexecution = "memoize"
task_log = "build/log.json"

[[extraction]]
id = "themes"
kind = "command"
cmd = "echo themes"
"#,
    );

    let cfg = load_and_validate(file.path()).unwrap();

    assert_eq!(cfg.config.workers, 2);
    assert_eq!(cfg.config.reexecution, ReexecutionPolicy::Memoize);
    assert_eq!(cfg.config.task_log.as_deref(), Some(std::path::Path::new("build/log.json")));
}
