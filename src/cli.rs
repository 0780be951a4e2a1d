// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::types::{FailurePolicy, ReexecutionPolicy};

/// Command-line arguments for `pipedag`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "pipedag",
    version,
    about = "Run a phased content pipeline on a dependency-gated task orchestrator.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Pipedag.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Pipedag.toml")]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `PIPEDAG_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print phases and task order, but don't execute anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Worker-pool bound for bounded-parallel phases (overrides `[config].workers`).
    #[arg(long, value_name = "N")]
    pub workers: Option<usize>,

    /// Where to write the execution log as JSON (overrides `[config].task_log`).
    #[arg(long, value_name = "PATH")]
    pub task_log: Option<PathBuf>,

    /// Failure policy of the extraction phase: strict or tolerant.
    #[arg(long, value_name = "POLICY")]
    pub extraction_policy: Option<FailurePolicy>,

    /// What executing an already finished task does: rerun, reject or memoize.
    #[arg(long, value_name = "POLICY")]
    pub reexecution: Option<ReexecutionPolicy>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
