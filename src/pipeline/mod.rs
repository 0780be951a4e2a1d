// src/pipeline/mod.rs

//! The content pipeline built on top of the orchestrator.
//!
//! - [`phase`] defines the fixed phase sequence, modes and policies.
//! - [`steps`] turns configured step actions into runnable tasks.
//! - [`units`] resolves the per-unit generation tasks.
//! - [`driver`] runs the phases in order and reports their outcome.

pub mod driver;
pub mod phase;
pub mod steps;
pub mod units;

pub use driver::{PipelineDriver, PipelineReport, DEFAULT_PUBLISH_ID};
pub use phase::{Phase, PhaseKind, PhaseReport, PhaseStatus};
pub use steps::{CommandFailure, StepTask};
pub use units::{resolve_units, GenerationUnit};
