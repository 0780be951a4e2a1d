// src/engine/log.rs

//! Append-only record of every task attempt.

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use tracing::info;

use crate::errors::Result;
use crate::fs::FileSystem;
use crate::types::{TaskId, TaskStatus};

/// How an attempt ended: a duration on success, an error message on failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum LogOutcome {
    Completed {
        #[serde(serialize_with = "serialize_secs")]
        duration: Duration,
    },
    Failed {
        error: String,
    },
}

fn serialize_secs<S: Serializer>(duration: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}

/// One execution attempt. Timestamps are wall-clock; the duration is
/// measured on the monotonic clock.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    pub task_id: TaskId,
    pub status: TaskStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(flatten)]
    pub outcome: LogOutcome,
}

impl LogEntry {
    pub fn completed(
        task_id: TaskId,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        duration: Duration,
    ) -> Self {
        Self {
            task_id,
            status: TaskStatus::Completed,
            start_time,
            end_time,
            outcome: LogOutcome::Completed { duration },
        }
    }

    pub fn failed(
        task_id: TaskId,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        error: String,
    ) -> Self {
        Self {
            task_id,
            status: TaskStatus::Failed,
            start_time,
            end_time,
            outcome: LogOutcome::Failed { error },
        }
    }

    pub fn duration(&self) -> Option<Duration> {
        match &self.outcome {
            LogOutcome::Completed { duration } => Some(*duration),
            LogOutcome::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            LogOutcome::Completed { .. } => None,
            LogOutcome::Failed { error } => Some(error),
        }
    }
}

#[derive(Debug, Default)]
pub struct ExecutionLog {
    entries: Mutex<Vec<LogEntry>>,
}

impl ExecutionLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<LogEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn append(&self, entry: LogEntry) {
        self.lock().push(entry);
    }

    /// Copy of all entries in append order.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&*self.lock())?)
    }

    /// Write the log as a pretty-printed JSON array, creating parent
    /// directories as needed.
    pub fn flush(&self, fs: &dyn FileSystem, path: &Path) -> Result<()> {
        let json = self.to_json()?;
        fs.write(path, json.as_bytes())?;
        info!(path = %path.display(), entries = self.len(), "execution log written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    #[test]
    fn serializes_duration_or_error() {
        let now = Utc::now();
        let log = ExecutionLog::new();
        log.append(LogEntry::completed("a".into(), now, now, Duration::from_millis(1500)));
        log.append(LogEntry::failed("b".into(), now, now, "boom".into()));

        let value: serde_json::Value = serde_json::from_str(&log.to_json().unwrap()).unwrap();
        let records = value.as_array().unwrap();

        assert_eq!(records[0]["task_id"], "a");
        assert_eq!(records[0]["status"], "completed");
        assert_eq!(records[0]["duration"], 1.5);
        assert!(records[0].get("error").is_none());

        assert_eq!(records[1]["status"], "failed");
        assert_eq!(records[1]["error"], "boom");
        assert!(records[1].get("duration").is_none());
    }

    #[test]
    fn flush_writes_through_filesystem() {
        let fs = MockFileSystem::new();
        let log = ExecutionLog::new();
        let now = Utc::now();
        log.append(LogEntry::completed("a".into(), now, now, Duration::ZERO));

        log.flush(&fs, Path::new("./build/task_log.json")).unwrap();

        let written = fs.read_to_string(Path::new("./build/task_log.json")).unwrap();
        assert!(written.contains("\"task_id\": \"a\""));
    }
}
