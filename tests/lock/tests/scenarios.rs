//! The nominal, force-rejection, and stability-rejection scenarios run end
//! to end through the orchestrator in simulated mode.

use lock_tests::scenario::{
    nominal_state, perception, scenario_config, state, wrist_chunk, INSTRUCTION,
    UNSTABLE_BASE_VELOCITY, UPRIGHT,
};
use mrcp_harness::PipelineOrchestrator;
use mrcp_kernel::contracts::execution::ExecutionOutcome;
use mrcp_kernel::contracts::report::RejectionKind;
use mrcp_kernel::contracts::snapshot::RobotStateSnapshot;

fn orchestrator() -> PipelineOrchestrator {
    PipelineOrchestrator::from_config(&scenario_config(), None).unwrap()
}

#[test]
fn nominal_is_certified_executed_and_cached_on_replay() {
    let o = orchestrator();
    let current = nominal_state();
    let plan_id = o.begin_plan(INSTRUCTION, &perception(), &current).unwrap();
    let chunk_id = o.register_chunk(&plan_id, wrist_chunk(0, 20.0)).unwrap();

    let report = o.verify_chunk(&plan_id, &chunk_id, &current).unwrap();
    assert!(report.is_valid());
    assert_eq!(report.metrics().zmp_score, Some(0.8));
    assert_eq!(report.metrics().peak_force, Some(20.0));
    assert_eq!(report.metrics().limit_violations, Some(0));

    let first = o.execute_chunk(&plan_id, &chunk_id, &current).unwrap();
    assert_eq!(first.outcome(), ExecutionOutcome::Executed);
    assert_eq!(first.final_state().position_of("joint_7"), Some(0.15));
    assert_eq!(first.logical_duration_ns(), 1_000_000_000);

    let replay = o.execute_chunk(&plan_id, &chunk_id, &current).unwrap();
    assert_eq!(replay.outcome(), ExecutionOutcome::Cached);
    assert!(first.same_payload(&replay));
    assert_eq!(o.adapter().backend_invocations(), 1);
}

#[test]
fn force_scenario_is_rejected_with_peak_force() {
    let o = orchestrator();
    let current = nominal_state();
    let plan_id = o.begin_plan(INSTRUCTION, &perception(), &current).unwrap();
    let chunk_id = o.register_chunk(&plan_id, wrist_chunk(0, 150.0)).unwrap();
    let result = o.execute_chunk(&plan_id, &chunk_id, &current).unwrap();

    assert_eq!(result.outcome(), ExecutionOutcome::Rejected);
    let report = result.safety_report().unwrap();
    assert!(!report.is_valid());
    assert_eq!(report.rejection_kind(), Some(RejectionKind::ForceLimitError));
    assert_eq!(report.metrics().peak_force, Some(150.0));
    assert_eq!(result.final_state(), &current);
    assert_eq!(o.adapter().backend_invocations(), 0);
}

#[test]
fn stability_scenario_is_rejected_with_score() {
    let o = orchestrator();
    let current: RobotStateSnapshot = state(UPRIGHT, UNSTABLE_BASE_VELOCITY);
    let plan_id = o.begin_plan(INSTRUCTION, &perception(), &current).unwrap();
    let chunk_id = o.register_chunk(&plan_id, wrist_chunk(0, 20.0)).unwrap();
    let result = o.execute_chunk(&plan_id, &chunk_id, &current).unwrap();

    assert_eq!(result.outcome(), ExecutionOutcome::Rejected);
    let report = result.safety_report().unwrap();
    assert_eq!(report.rejection_kind(), Some(RejectionKind::StabilityError));
    assert_eq!(report.metrics().zmp_score, Some(0.22));
    assert_eq!(report.metrics().peak_force, None);
}

#[test]
fn verification_is_mode_agnostic() {
    use std::sync::Arc;

    use lock_tests::fake_client::FakeActionClient;
    use mrcp_harness::ExecutionMode;

    let mut hw_config = scenario_config();
    hw_config.execution.mode = ExecutionMode::Hardware;
    let hw = PipelineOrchestrator::from_config(&hw_config, Some(Arc::new(FakeActionClient::default()))).unwrap();
    let sim = orchestrator();

    for force in [20.0, 150.0] {
        let current = nominal_state();
        let reports: Vec<_> = [&sim, &hw]
            .iter()
            .map(|o| {
                let p = o.begin_plan(INSTRUCTION, &perception(), &current).unwrap();
                let c = o.register_chunk(&p, wrist_chunk(0, force)).unwrap();
                o.runtime()
                    .canonicalize(&o.verify_chunk(&p, &c, &current).unwrap())
                    .unwrap()
            })
            .collect();
        assert_eq!(reports[0], reports[1], "force {force}");
    }
}
