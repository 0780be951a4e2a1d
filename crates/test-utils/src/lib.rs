pub mod builders;
pub mod tasks;

use std::future::Future;
use std::sync::Once;
use std::time::Duration;

use pipedag::logging::LOG_ENV;
use tracing_subscriber::{fmt, EnvFilter};

pub use builders::{ConfigFileBuilder, StepConfigBuilder};
pub use tasks::{ConcurrencyProbe, FailingTask, RecordingTask, SleepTask};

static INIT: Once = Once::new();

/// Upper bound for a single orchestrator or pipeline call in tests.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Install a tracing subscriber once per test binary.
///
/// Honours `PIPEDAG_LOG` like the binary does, defaulting to `warn` so
/// passing runs stay quiet. Output goes through the test writer and only
/// shows up for failing tests.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));

        // Another harness may already own the global subscriber.
        let _ = fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(false)
            .try_init();
    });
}

/// Await `f`, failing the test if it outlives [`TEST_TIMEOUT`].
///
/// A scheduler bug (a permit never released, a task stuck in `Processing`)
/// then shows up as a failure instead of a hung `cargo test`.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: Future<Output = T>,
{
    match tokio::time::timeout(TEST_TIMEOUT, f).await {
        Ok(value) => value,
        Err(_) => panic!("pipedag call did not finish within {TEST_TIMEOUT:?}"),
    }
}
