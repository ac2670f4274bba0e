//! Idempotent replay and at-most-one build under concurrency.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::time::Duration;

use lock_tests::fake_client::FakeActionClient;
use lock_tests::scenario::{nominal_state, perception, scenario_config, wrist_chunk, INSTRUCTION};
use mrcp_harness::execution::hardware::HardwareBackend;
use mrcp_harness::memo::{BuildOutcome, BuildTable, MemoError, TryBuild};
use mrcp_harness::{ExecutionAdapter, ExecutionBackend, PipelineOrchestrator};
use mrcp_kernel::contracts::execution::ExecutionOutcome;

#[test]
fn second_execute_is_cached_and_backend_not_invoked() {
    let client = Arc::new(FakeActionClient::default());
    let adapter = ExecutionAdapter::new(ExecutionBackend::Hardware(HardwareBackend::new(
        client.clone(),
        Duration::from_millis(200),
    )));
    let o = PipelineOrchestrator::new(
        mrcp_kernel::runtime::DeterminismRuntime::shared(Default::default()).unwrap(),
        &scenario_config(),
        adapter,
    )
    .unwrap();
    let current = nominal_state();
    let p = o.begin_plan(INSTRUCTION, &perception(), &current).unwrap();
    let c = o.register_chunk(&p, wrist_chunk(0, 20.0)).unwrap();

    let first = o.execute_chunk(&p, &c, &current).unwrap();
    let second = o.execute_chunk(&p, &c, &current).unwrap();
    assert_eq!(first.outcome(), ExecutionOutcome::Executed);
    assert_eq!(second.outcome(), ExecutionOutcome::Cached);
    assert!(first.same_payload(&second));
    assert_eq!(client.goals_sent(), 1);
    assert_eq!(client.telemetry_published(), 1);

    let goal = client.last_goal().unwrap();
    assert_eq!(goal.joint_names.len(), 7);
    assert_eq!(goal.waypoints.len(), 3);
    assert_eq!(goal.time_from_start.last().copied(), Some(1.0));
}

#[test]
fn concurrent_executes_dispatch_once() {
    let o = PipelineOrchestrator::from_config(&scenario_config(), None).unwrap();
    let current = nominal_state();
    let p = o.begin_plan(INSTRUCTION, &perception(), &current).unwrap();
    let c = o.register_chunk(&p, wrist_chunk(0, 20.0)).unwrap();
    let barrier = Barrier::new(16);

    let outcomes: Vec<ExecutionOutcome> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..16)
            .map(|_| {
                s.spawn(|| {
                    barrier.wait();
                    o.execute_chunk(&p, &c, &current).unwrap().outcome()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(o.adapter().backend_invocations(), 1);
    let executed = outcomes.iter().filter(|o| **o == ExecutionOutcome::Executed).count();
    assert_eq!(executed, 1, "{outcomes:?}");
    assert!(outcomes
        .iter()
        .all(|o| matches!(o, ExecutionOutcome::Executed | ExecutionOutcome::Cached)));
}

#[test]
fn get_or_build_runs_builder_once_under_contention() {
    let table: BuildTable<u32, String> = BuildTable::new();
    let calls = AtomicUsize::new(0);
    let barrier = Barrier::new(12);

    let values: Vec<String> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..12)
            .map(|_| {
                s.spawn(|| {
                    barrier.wait();
                    table
                        .get_or_build(&7, || {
                            calls.fetch_add(1, Ordering::SeqCst);
                            std::thread::sleep(Duration::from_millis(20));
                            Ok::<_, String>("built".to_string())
                        })
                        .unwrap()
                        .into_value()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(values.iter().all(|v| v == "built"));
}

#[test]
fn try_get_or_build_reports_in_progress() {
    let table: BuildTable<u32, u32> = BuildTable::new();
    let started = Barrier::new(2);
    let release = Barrier::new(2);

    std::thread::scope(|s| {
        let builder = s.spawn(|| {
            table.get_or_build(&1, || {
                started.wait();
                release.wait();
                Ok::<_, ()>(10)
            })
        });
        started.wait();
        assert_eq!(
            table.try_get_or_build(&1, || Ok::<_, ()>(99)).unwrap(),
            TryBuild::InProgress
        );
        release.wait();
        assert_eq!(builder.join().unwrap().unwrap(), BuildOutcome::Built(10));
    });
    assert_eq!(
        table.try_get_or_build(&1, || Ok::<_, ()>(99)).unwrap(),
        TryBuild::Done(BuildOutcome::Cached(10))
    );
}

#[test]
fn builder_failure_does_not_poison_and_poison_is_final() {
    let table: BuildTable<u32, u32> = BuildTable::new();
    assert_eq!(
        table.get_or_build(&1, || Err::<u32, _>("transient")),
        Err(MemoError::Builder("transient"))
    );
    assert_eq!(
        table.get_or_build(&1, || Ok::<_, &str>(5)).unwrap(),
        BuildOutcome::Built(5)
    );

    table.poison(2, "hash failure");
    assert!(matches!(
        table.get_or_build(&2, || Ok::<_, &str>(5)),
        Err(MemoError::Poisoned { .. })
    ));
}
