mod common;

use std::collections::HashSet;
use std::time::{Duration, Instant};

use pipedag::types::TaskStatus;
use pipedag_test_utils::{with_timeout, ConcurrencyProbe, FailingTask, RecordingTask, SleepTask};

use common::{call_log, ids, orchestrator};

#[tokio::test]
async fn test_batch_partitions_successes_and_failures() {
    let orch = orchestrator(4);
    let calls = call_log();
    for name in ["a", "b", "d"] {
        orch.register(name, RecordingTask::new(name, calls.clone()), Vec::<String>::new())
            .unwrap();
    }
    orch.register("c", FailingTask::new("chapter too short"), Vec::<String>::new())
        .unwrap();
    orch.register("e", FailingTask::new("template missing"), Vec::<String>::new())
        .unwrap();

    let batch = ids(&["a", "b", "c", "d", "e"]);
    let outcome = with_timeout(orch.execute_batch(&batch)).await;

    assert_eq!(outcome.results.len(), 3);
    assert_eq!(outcome.failed.len(), 2);
    assert_eq!(outcome.total(), 5);
    assert!(!outcome.is_success());

    let failed: HashSet<&str> = outcome.failed_ids().collect();
    assert_eq!(failed, HashSet::from(["c", "e"]));
    for id in &batch {
        let in_results = outcome.results.contains_key(id);
        let in_failed = failed.contains(id.as_str());
        assert!(in_results ^ in_failed, "{id} must be in exactly one output");
    }

    let message = outcome
        .failed
        .iter()
        .find(|(id, _)| id == "c")
        .map(|(_, msg)| msg.as_str());
    assert_eq!(message, Some("chapter too short"));
    assert_eq!(orch.get_status("c").unwrap(), TaskStatus::Failed);
    assert_eq!(orch.get_status("d").unwrap(), TaskStatus::Completed);
}

#[tokio::test]
async fn test_batch_respects_worker_bound() {
    let orch = orchestrator(4);
    let probe = ConcurrencyProbe::new();
    let latency = Duration::from_millis(50);

    let mut batch = Vec::new();
    for i in 0..10 {
        let id = format!("unit_{i}");
        orch.register(id.clone(), SleepTask::new(latency, probe.clone()), Vec::<String>::new())
            .unwrap();
        batch.push(id);
    }

    let started = Instant::now();
    let outcome = with_timeout(orch.execute_batch(&batch)).await;
    let elapsed = started.elapsed();

    assert!(outcome.is_success());
    assert_eq!(outcome.results.len(), 10);
    assert!(probe.max_in_flight() <= 4, "saw {} tasks in flight", probe.max_in_flight());
    // ceil(10 / 4) = 3 waves of 50ms.
    assert!(elapsed >= Duration::from_millis(150), "finished too fast: {elapsed:?}");
    assert!(elapsed < Duration::from_millis(450), "finished too slow: {elapsed:?}");
}

#[tokio::test]
async fn test_pool_is_reused_across_batches() {
    let orch = orchestrator(2);
    let probe = ConcurrencyProbe::new();

    for round in 0..3 {
        let batch: Vec<String> = (0..4).map(|i| format!("r{round}_{i}")).collect();
        for id in &batch {
            orch.register(
                id.clone(),
                SleepTask::new(Duration::from_millis(10), probe.clone()),
                Vec::<String>::new(),
            )
            .unwrap();
        }
        let outcome = with_timeout(orch.execute_batch(&batch)).await;
        assert!(outcome.is_success());
    }

    assert_eq!(orch.workers(), 2);
    assert!(probe.max_in_flight() <= 2);
    assert_eq!(orch.log().len(), 12);
}

#[tokio::test]
async fn test_gate_failures_are_captured_per_task() {
    let orch = orchestrator(4);
    orch.register("outline", RecordingTask::new("outline", call_log()), Vec::<String>::new())
        .unwrap();
    orch.register("ch1", RecordingTask::new("ch1", call_log()), ["outline"])
        .unwrap();
    orch.register("free", RecordingTask::new("free", call_log()), Vec::<String>::new())
        .unwrap();

    let outcome = with_timeout(orch.execute_batch(&ids(&["ch1", "free", "missing"]))).await;

    assert_eq!(outcome.results.len(), 1);
    assert!(outcome.results.contains_key("free"));
    assert_eq!(outcome.failed.len(), 2);

    let ch1 = outcome.failed.iter().find(|(id, _)| id == "ch1").unwrap();
    assert!(ch1.1.contains("outline"));
    let missing = outcome.failed.iter().find(|(id, _)| id == "missing").unwrap();
    assert!(missing.1.contains("not found"));

    assert_eq!(orch.get_status("ch1").unwrap(), TaskStatus::Pending);
}

#[tokio::test]
async fn test_duplicate_ids_in_batch_run_once() {
    let orch = orchestrator(4);
    let calls = call_log();
    orch.register("a", RecordingTask::new("a", calls.clone()), Vec::<String>::new())
        .unwrap();

    let outcome = with_timeout(orch.execute_batch(&ids(&["a", "a", "a"]))).await;

    assert_eq!(outcome.total(), 1);
    assert_eq!(calls.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_empty_batch_is_a_no_op() {
    let orch = orchestrator(4);
    let outcome = orch.execute_batch(&[]).await;

    assert_eq!(outcome.total(), 0);
    assert!(outcome.is_success());
    assert!(orch.log().is_empty());
}
