//! Memoized verdicts are a function of the memo key alone.
//!
//! The report memo is keyed by the canonical state digest, so states that
//! differ below the rounding precision share an entry. Each must then get
//! the verdict the shared canonical state earns, whichever came first.

use lock_tests::scenario::{
    chunk, nominal_state, perception, scenario_config, state, wrist, INSTRUCTION,
    NOMINAL_BASE_VELOCITY, UPRIGHT,
};
use mrcp_harness::PipelineOrchestrator;
use mrcp_kernel::contracts::execution::ExecutionOutcome;
use mrcp_kernel::contracts::ids::{ChunkId, PlanId};
use mrcp_kernel::contracts::report::{RejectionKind, SafetyReport};
use mrcp_kernel::contracts::snapshot::RobotStateSnapshot;

/// Wrist-only chunk starting exactly one continuity tolerance from upright.
fn at_tolerance() -> (PipelineOrchestrator, PlanId, ChunkId) {
    let o = PipelineOrchestrator::from_config(&scenario_config(), None).unwrap();
    let plan_id = o.begin_plan(INSTRUCTION, &perception(), &nominal_state()).unwrap();
    let chunk_id = o
        .register_chunk(&plan_id, chunk(0, &[wrist(0.1), wrist(0.15)], 20.0))
        .unwrap();
    (o, plan_id, chunk_id)
}

fn wrist_state(angle: f64) -> RobotStateSnapshot {
    state(wrist(angle), NOMINAL_BASE_VELOCITY)
}

fn verify_in_order(states: &[RobotStateSnapshot]) -> Vec<SafetyReport> {
    let (o, p, c) = at_tolerance();
    states
        .iter()
        .map(|s| o.verify_chunk(&p, &c, s).unwrap())
        .collect()
}

#[test]
fn sub_precision_states_get_the_same_verdict_in_either_order() {
    let upright = state(UPRIGHT, NOMINAL_BASE_VELOCITY);
    let nudged = wrist_state(-4e-7);

    let alone = verify_in_order(std::slice::from_ref(&nudged));
    let after = verify_in_order(&[upright.clone(), nudged.clone()]);
    let before = verify_in_order(&[nudged, upright]);

    assert!(alone[0].is_valid(), "{}", alone[0].reason_text());
    assert_eq!(after[1], alone[0]);
    assert_eq!(before[0], alone[0]);
    assert_eq!(after[0], before[1]);
}

#[test]
fn state_above_precision_is_rejected_after_a_neighbour_was_certified() {
    let (o, p, c) = at_tolerance();
    assert!(o.verify_chunk(&p, &c, &state(UPRIGHT, NOMINAL_BASE_VELOCITY)).unwrap().is_valid());

    let result = o.execute_chunk(&p, &c, &wrist_state(-6e-7)).unwrap();
    assert_eq!(result.outcome(), ExecutionOutcome::Rejected);
    assert_eq!(
        result.safety_report().unwrap().rejection_kind(),
        Some(RejectionKind::ContinuityError)
    );
    assert_eq!(o.adapter().backend_invocations(), 0);
}

#[test]
fn execution_after_memoized_verdict_matches_direct_verification() {
    let (o, p, c) = at_tolerance();
    let nudged = wrist_state(-4e-7);
    let direct = verify_in_order(std::slice::from_ref(&nudged)).remove(0);

    o.verify_chunk(&p, &c, &state(UPRIGHT, NOMINAL_BASE_VELOCITY)).unwrap();
    let result = o.execute_chunk(&p, &c, &nudged).unwrap();
    assert_eq!(result.outcome() == ExecutionOutcome::Executed, direct.is_valid());
    assert_eq!(o.memoized_reports(), 1);
}
