// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod pipeline;
pub mod types;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::ConfigFile;
use crate::config::validate_config;
use crate::dag::DagGraph;
use crate::fs::{FileSystem, RealFileSystem};
use crate::pipeline::{PhaseKind, PipelineDriver};

pub use crate::engine::{Orchestrator, OrchestratorOptions};
pub use crate::errors::PipedagError;
pub use crate::exec::{BatchOutcome, FnTask, Task, TaskOutput};
pub use crate::types::{ReexecutionPolicy, TaskId, TaskStatus};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and CLI overrides
/// - the pipeline driver and its orchestrator
/// - flushing the execution log
///
/// Returns the process exit code: 0 when every strict phase passed.
pub async fn run(args: CliArgs) -> Result<i32> {
    let config_path = PathBuf::from(&args.config);
    let mut cfg = load_and_validate(&config_path)
        .with_context(|| format!("loading config {}", config_path.display()))?;
    apply_overrides(&mut cfg, &args)?;

    if args.dry_run {
        print_dry_run(&cfg)?;
        return Ok(0);
    }

    let root = project_root(&config_path, &cfg);
    let task_log = cfg.config.task_log.clone();
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    info!(root = %root.display(), workers = cfg.config.workers, "starting pipeline");

    let driver = PipelineDriver::new(cfg, Arc::clone(&fs), &root);
    let mut stdout = std::io::stdout();
    let outcome = driver.run(&mut stdout).await;

    // The log is written whether or not the run made it to the end.
    if let Some(path) = task_log {
        let path = root.join(path);
        driver
            .orchestrator()
            .flush_log(fs.as_ref(), &path)
            .with_context(|| format!("writing execution log to {}", path.display()))?;
    }

    let report = outcome?;
    Ok(report.exit_code())
}

fn apply_overrides(cfg: &mut ConfigFile, args: &CliArgs) -> Result<()> {
    let section = cfg.config_mut();
    if let Some(workers) = args.workers {
        section.workers = workers;
    }
    if let Some(path) = &args.task_log {
        section.task_log = Some(path.clone());
    }
    if let Some(policy) = args.extraction_policy {
        section.extraction_policy = policy;
    }
    if let Some(policy) = args.reexecution {
        section.reexecution = policy;
    }

    validate_config(cfg).context("invalid command-line override")?;
    Ok(())
}

/// Figure out the directory steps run in.
///
/// - If the config path has a non-empty parent (e.g. "book/Pipedag.toml"),
///   we use that directory, otherwise the current working directory.
/// - `[config].working_dir` is resolved relative to that.
fn project_root(config_path: &Path, cfg: &ConfigFile) -> PathBuf {
    let base = match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    };

    match &cfg.config.working_dir {
        Some(dir) => base.join(dir),
        None => base,
    }
}

/// Simple dry-run output: print phases, steps, deps and execution order.
fn print_dry_run(cfg: &ConfigFile) -> Result<()> {
    println!("pipedag dry-run");
    println!("  config.workers = {}", cfg.config.workers);
    println!("  config.extraction_policy = {}", cfg.config.extraction_policy);
    println!("  config.reexecution = {:?}", cfg.config.reexecution);
    println!();

    for kind in PhaseKind::ALL {
        let policy = kind.policy(cfg.config.extraction_policy);
        println!("{}. {} ({}, {})", kind.number(), kind, kind.mode(), policy);

        if kind == PhaseKind::Generation {
            match &cfg.generation {
                Some(generation) => {
                    println!("  - generate:<unit>");
                    println!("      cmd: {}", generation.cmd);
                    if let Some(units) = &generation.units {
                        println!("      units: {:?}", units);
                    }
                    if let Some(file) = &generation.units_file {
                        println!("      units_file: {}", file.display());
                    }
                }
                None => println!("  (none)"),
            }
            continue;
        }

        let steps = cfg.steps(kind);
        if steps.is_empty() {
            let fallback = kind == PhaseKind::Publish && cfg.publish.is_none();
            println!("  {}", if fallback { "(default publish note)" } else { "(none)" });
        }
        for step in steps {
            println!("  - {} [{}]", step.id, step.action.kind());
            if !step.after.is_empty() {
                println!("      after: {:?}", step.after);
            }
        }
    }

    let graph = DagGraph::from_dependencies(cfg.step_dependencies());
    let order = graph
        .topological_order()
        .map_err(|node| anyhow::anyhow!("cycle detected involving step '{node}'"))?;
    println!();
    println!("static step order: {}", order.join(" -> "));

    debug!("dry-run complete (no execution)");
    Ok(())
}
