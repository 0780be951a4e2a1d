mod common;

use std::collections::HashSet;

use pipedag::errors::PipedagError;
use pipedag::types::TaskStatus;
use pipedag_test_utils::{FailingTask, RecordingTask};
use proptest::prelude::*;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    // Every id of a batch lands in exactly one of the two outputs, and the
    // failed ones are exactly the ones whose function fails.
    #[test]
    fn prop_batch_partitions_ids(fails in proptest::collection::vec(any::<bool>(), 0..24), workers in 1usize..6) {
        let rt = runtime();
        let orch = common::orchestrator(workers);
        let calls = common::call_log();

        let mut batch = Vec::new();
        let mut expected_failed = HashSet::new();
        for (i, fail) in fails.iter().enumerate() {
            let id = format!("t{i}");
            if *fail {
                orch.register(id.clone(), FailingTask::new("nope"), Vec::<String>::new()).unwrap();
                expected_failed.insert(id.clone());
            } else {
                orch.register(id.clone(), RecordingTask::new(&id, calls.clone()), Vec::<String>::new()).unwrap();
            }
            batch.push(id);
        }

        let outcome = rt.block_on(orch.execute_batch(&batch));

        prop_assert_eq!(outcome.total(), batch.len());
        prop_assert_eq!(outcome.results.len(), batch.len() - expected_failed.len());
        let failed: HashSet<String> = outcome.failed_ids().map(str::to_string).collect();
        prop_assert_eq!(&failed, &expected_failed);
        for id in &batch {
            prop_assert!(outcome.results.contains_key(id) != failed.contains(id));
        }
        prop_assert_eq!(orch.log().len(), batch.len());
    }

    // A task whose dependency is not completed is always refused, whatever
    // state the dependency is in, and stays pending.
    #[test]
    fn prop_gate_refuses_until_dependency_completes(dep_state in 0u8..3) {
        let rt = runtime();
        let orch = common::orchestrator(2);
        let dep_task_fails = dep_state == 2;

        if dep_task_fails {
            orch.register("dep", FailingTask::new("broken"), Vec::<String>::new()).unwrap();
        } else {
            orch.register("dep", RecordingTask::new("dep", common::call_log()), Vec::<String>::new()).unwrap();
        }
        orch.register("child", RecordingTask::new("child", common::call_log()), ["dep"]).unwrap();

        // 0: dep never run, 1: dep completed, 2: dep failed
        if dep_state > 0 {
            let _ = rt.block_on(orch.execute("dep"));
        }

        let result = rt.block_on(orch.execute("child"));
        if dep_state == 1 {
            prop_assert!(result.is_ok());
            prop_assert_eq!(orch.get_status("child").unwrap(), TaskStatus::Completed);
        } else {
            let refused = matches!(result, Err(PipedagError::DependencyNotSatisfied { .. }));
            prop_assert!(refused);
            prop_assert_eq!(orch.get_status("child").unwrap(), TaskStatus::Pending);
        }
    }
}
