//! Inclusive safety boundaries and first-failure ordering.

use lock_tests::scenario::{
    chunk, nominal_state, scenario_profile, state, wrist, wrist_chunk, UPRIGHT,
};
use mrcp_kernel::contracts::report::{Rejection, RejectionKind, SafetyReport};
use mrcp_kernel::contracts::snapshot::RobotStateSnapshot;
use mrcp_safety::{SafetyThresholds, SafetyVerificationEngine};

fn engine() -> SafetyVerificationEngine {
    SafetyVerificationEngine::new(scenario_profile(), SafetyThresholds::default(), 6).unwrap()
}

fn verify_wrist_start(start: f64) -> SafetyReport {
    engine()
        .verify(&chunk(0, &[wrist(start), wrist(0.15)], 20.0), &nominal_state())
        .unwrap()
}

fn verify_at_base_velocity(v: f64) -> SafetyReport {
    let s: RobotStateSnapshot = state(UPRIGHT, v);
    engine().verify(&wrist_chunk(0, 20.0), &s).unwrap()
}

#[test]
fn continuity_passes_at_exactly_tolerance() {
    let r = verify_wrist_start(0.10);
    assert!(r.is_valid(), "{}", r.reason_text());
    assert_eq!(r.metrics().continuity_error, Some(0.1));
}

#[test]
fn continuity_fails_just_above_tolerance() {
    let r = verify_wrist_start(0.1001);
    assert_eq!(r.rejection_kind(), Some(RejectionKind::ContinuityError));
    match r.reason() {
        Some(Rejection::ContinuityError { joint, delta, tolerance }) => {
            assert_eq!(joint, "joint_7");
            assert!((delta - 0.1001).abs() < 1e-12);
            assert_eq!(*tolerance, 0.1);
        }
        other => panic!("unexpected reason {other:?}"),
    }
    // Later checks never ran.
    assert_eq!(r.metrics().limit_violations, None);
    assert_eq!(r.metrics().zmp_score, None);
    assert_eq!(r.metrics().peak_force, None);
}

#[test]
fn stability_passes_at_exactly_threshold() {
    let r = verify_at_base_velocity(2.0);
    assert!(r.is_valid(), "{}", r.reason_text());
    assert_eq!(r.metrics().zmp_score, Some(0.4));
}

#[test]
fn stability_fails_just_below_threshold() {
    let r = verify_at_base_velocity(0.601 / 0.3);
    assert_eq!(r.rejection_kind(), Some(RejectionKind::StabilityError));
    assert_eq!(r.metrics().zmp_score, Some(0.399));
    assert_eq!(r.metrics().peak_force, None);
}

#[test]
fn force_passes_at_exactly_ceiling() {
    let r = engine().verify(&wrist_chunk(0, 100.0), &nominal_state()).unwrap();
    assert!(r.is_valid(), "{}", r.reason_text());
    assert_eq!(r.metrics().peak_force, Some(100.0));
}

#[test]
fn force_fails_just_above_ceiling() {
    let r = engine().verify(&wrist_chunk(0, 100.1), &nominal_state()).unwrap();
    assert_eq!(
        r.reason(),
        Some(&Rejection::ForceLimitError {
            estimate: 100.1,
            limit: 100.0
        })
    );
}

#[test]
fn joint_limits_are_reported_before_force() {
    let mut off_limits = wrist(0.1);
    off_limits[1] = 2.5;
    let r = engine()
        .verify(&chunk(0, &[wrist(0.05), off_limits], 150.0), &nominal_state())
        .unwrap();
    assert_eq!(r.rejection_kind(), Some(RejectionKind::JointLimitError));
    match r.reason() {
        Some(Rejection::JointLimitError {
            waypoint_index, joint, ..
        }) => {
            assert_eq!(*waypoint_index, 1);
            assert_eq!(joint, "joint_2");
        }
        other => panic!("unexpected reason {other:?}"),
    }
    let m = r.metrics();
    assert_eq!(m.continuity_error, Some(0.05));
    assert_eq!(m.limit_violations, Some(1));
    assert_eq!(m.zmp_score, None);
    assert_eq!(m.peak_force, None);
}

#[test]
fn rejection_reason_text_is_human_readable() {
    let r = engine().verify(&wrist_chunk(0, 150.0), &nominal_state()).unwrap();
    let text = r.reason_text();
    assert!(text.contains("ForceLimitError"), "{text}");
    assert!(text.contains("150"), "{text}");
}
