// src/exec/task.rs

//! The unit-of-work abstraction the orchestrator executes.
//!
//! The orchestrator never interprets what a task does. It only needs a
//! single `run()` entry point that yields an opaque, loggable value or an
//! error. Pipeline steps implement [`Task`] in `pipeline::steps`; tests and
//! embedders can wrap closures with [`FnTask`] or [`BlockingTask`].

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::anyhow;

/// Opaque result value produced by a task.
pub type TaskOutput = serde_json::Value;

/// Boxed future returned by [`Task::run`].
///
/// The future is `'static` so the executor can drive it on its own Tokio task
/// and turn a panic into an ordinary task failure.
pub type TaskFuture = Pin<Box<dyn Future<Output = anyhow::Result<TaskOutput>> + Send + 'static>>;

/// A zero-argument unit of work.
pub trait Task: Send + Sync {
    fn run(&self) -> TaskFuture;
}

/// Adapter turning an async closure into a [`Task`].
pub struct FnTask<F> {
    f: F,
}

impl<F, Fut> FnTask<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<TaskOutput>> + Send + 'static,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F, Fut> Task for FnTask<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<TaskOutput>> + Send + 'static,
{
    fn run(&self) -> TaskFuture {
        Box::pin((self.f)())
    }
}

impl<F> fmt::Debug for FnTask<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTask").finish_non_exhaustive()
    }
}

/// Adapter for synchronous closures that may block (file IO, CPU work).
///
/// The closure runs on Tokio's blocking thread pool so it never stalls the
/// async workers driving sibling tasks.
pub struct BlockingTask<F> {
    f: Arc<F>,
}

impl<F> BlockingTask<F>
where
    F: Fn() -> anyhow::Result<TaskOutput> + Send + Sync + 'static,
{
    pub fn new(f: F) -> Self {
        Self { f: Arc::new(f) }
    }
}

impl<F> Task for BlockingTask<F>
where
    F: Fn() -> anyhow::Result<TaskOutput> + Send + Sync + 'static,
{
    fn run(&self) -> TaskFuture {
        let f = Arc::clone(&self.f);
        Box::pin(async move {
            tokio::task::spawn_blocking(move || f())
                .await
                .map_err(|e| anyhow!("blocking task did not finish: {e}"))?
        })
    }
}

impl<F> fmt::Debug for BlockingTask<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockingTask").finish_non_exhaustive()
    }
}
