//! Snapshot changes above the rounding precision move the plan id;
//! changes below it do not.

use lock_tests::scenario::{perception, scenario_config, state, wrist, INSTRUCTION, NOMINAL_BASE_VELOCITY};
use mrcp_harness::PipelineOrchestrator;
use mrcp_kernel::contracts::ids::PlanId;

fn plan_for(posture: [f64; 7]) -> PlanId {
    let o = PipelineOrchestrator::from_config(&scenario_config(), None).unwrap();
    o.begin_plan(INSTRUCTION, &perception(), &state(posture, NOMINAL_BASE_VELOCITY))
        .unwrap()
}

#[test]
fn change_above_precision_changes_plan_id() {
    // Default precision is 6 decimal places.
    let base = plan_for(wrist(0.25));
    assert_ne!(base, plan_for(wrist(0.250_002)));
    assert_ne!(base, plan_for(wrist(0.249_998)));
}

#[test]
fn change_below_precision_keeps_plan_id() {
    let base = plan_for(wrist(0.25));
    assert_eq!(base, plan_for(wrist(0.250_000_4)));
    assert_eq!(base, plan_for(wrist(0.249_999_6)));
}

#[test]
fn every_joint_participates() {
    let base = plan_for([0.0; 7]);
    for j in 0..7 {
        let mut p = [0.0; 7];
        p[j] = 0.001;
        assert_ne!(base, plan_for(p), "joint {j} not bound into the plan id");
    }
}

#[test]
fn precision_is_part_of_the_config_digest() {
    let mut coarse = scenario_config();
    coarse.determinism.float_precision = 3;
    let a = PipelineOrchestrator::from_config(&coarse, None).unwrap();
    let b = PipelineOrchestrator::from_config(&scenario_config(), None).unwrap();
    let s = state(wrist(0.25), NOMINAL_BASE_VELOCITY);
    assert_ne!(
        a.begin_plan(INSTRUCTION, &perception(), &s).unwrap(),
        b.begin_plan(INSTRUCTION, &perception(), &s).unwrap()
    );
    // At 3 places, 0.2504 and 0.25 are the same snapshot.
    let s2 = state(wrist(0.2504), NOMINAL_BASE_VELOCITY);
    assert_eq!(
        a.begin_plan(INSTRUCTION, &perception(), &s).unwrap(),
        a.begin_plan(INSTRUCTION, &perception(), &s2).unwrap()
    );
}
