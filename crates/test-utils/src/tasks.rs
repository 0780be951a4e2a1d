//! Fake tasks for orchestrator tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;
use pipedag::exec::{Task, TaskFuture, TaskOutput};
use serde_json::json;

/// Records its name into a shared call list and returns a fixed output.
#[derive(Debug, Clone)]
pub struct RecordingTask {
    name: String,
    calls: Arc<Mutex<Vec<String>>>,
    output: TaskOutput,
}

impl RecordingTask {
    pub fn new(name: &str, calls: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            name: name.to_string(),
            calls,
            output: json!(name),
        }
    }

    pub fn with_output(mut self, output: TaskOutput) -> Self {
        self.output = output;
        self
    }
}

impl Task for RecordingTask {
    fn run(&self) -> TaskFuture {
        let this = self.clone();
        Box::pin(async move {
            this.calls.lock().unwrap().push(this.name.clone());
            Ok(this.output)
        })
    }
}

/// Tracks how many tasks are running at the same time.
#[derive(Debug, Clone, Default)]
pub struct ConcurrencyProbe {
    current: Arc<AtomicUsize>,
    max: Arc<AtomicUsize>,
}

impl ConcurrencyProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Highest number of tasks observed in flight at once.
    pub fn max_in_flight(&self) -> usize {
        self.max.load(Ordering::SeqCst)
    }

    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Sleeps for a fixed latency, then succeeds with `{"slept_ms": ..}`.
#[derive(Debug, Clone)]
pub struct SleepTask {
    delay: Duration,
    probe: ConcurrencyProbe,
}

impl SleepTask {
    pub fn new(delay: Duration, probe: ConcurrencyProbe) -> Self {
        Self { delay, probe }
    }
}

impl Task for SleepTask {
    fn run(&self) -> TaskFuture {
        let this = self.clone();
        Box::pin(async move {
            this.probe.enter();
            tokio::time::sleep(this.delay).await;
            this.probe.exit();
            Ok(json!({ "slept_ms": this.delay.as_millis() as u64 }))
        })
    }
}

/// Always fails with the given message.
#[derive(Debug, Clone)]
pub struct FailingTask {
    message: String,
}

impl FailingTask {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

impl Task for FailingTask {
    fn run(&self) -> TaskFuture {
        let message = self.message.clone();
        Box::pin(async move { Err(anyhow!(message)) })
    }
}
