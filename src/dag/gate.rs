// src/dag/gate.rs

//! Execution gate: a task may only run once every declared dependency is
//! `Completed`.
//!
//! The gate is evaluated right before execution rather than at registration,
//! so tasks can be registered before their dependencies exist. The first
//! unmet dependency in declaration order is the one reported.

use std::collections::HashMap;

use tracing::debug;

use crate::dag::registry::TaskEntry;
use crate::errors::{PipedagError, Result};
use crate::types::TaskStatus;

pub(crate) fn check(tasks: &HashMap<String, TaskEntry>, id: &str) -> Result<()> {
    let entry = tasks
        .get(id)
        .ok_or_else(|| PipedagError::TaskNotFound(id.to_string()))?;

    for dep in &entry.deps {
        let satisfied = tasks
            .get(dep)
            .is_some_and(|d| d.status == TaskStatus::Completed);

        if !satisfied {
            debug!(
                task = %id,
                dep = %dep,
                dep_status = ?tasks.get(dep).map(|d| d.status),
                "gate refused execution; dependency not completed"
            );
            return Err(PipedagError::DependencyNotSatisfied {
                task: id.to_string(),
                dependency: dep.clone(),
            });
        }
    }

    Ok(())
}
