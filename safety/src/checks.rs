//! The four safety checks, in the order the engine runs them.
//!
//! Each check reads the shared [`CheckInput`], records its metric, and
//! returns the rejection it found (if any). Checks never fail for an unsafe
//! chunk; they fail only when a metric cannot be computed.

use mrcp_kernel::contracts::chunk::JointTrajectoryChunk;
use mrcp_kernel::contracts::profile::RobotProfile;
use mrcp_kernel::contracts::report::{Rejection, RejectionKind, SafetyMetrics};
use mrcp_kernel::contracts::snapshot::RobotStateSnapshot;

use crate::config::{within_lower, within_upper, SafetyThresholds, COMPARISON_EPSILON};
use crate::error::VerifyError;
use crate::zmp;

/// Everything a check may read. Validated by the engine before any check runs.
pub struct CheckInput<'a> {
    pub chunk: &'a JointTrajectoryChunk,
    pub state: &'a RobotStateSnapshot,
    pub profile: &'a RobotProfile,
    pub thresholds: &'a SafetyThresholds,
    pub precision: u32,
}

/// Signature shared by every check.
pub type CheckFn = fn(&CheckInput<'_>, &mut SafetyMetrics) -> Result<Option<Rejection>, VerifyError>;

/// Fixed evaluation order. Operators and tests key off the first failure,
/// so this order must not change.
pub const CHECK_ORDER: [(RejectionKind, CheckFn); 4] = [
    (RejectionKind::ContinuityError, continuity),
    (RejectionKind::JointLimitError, joint_limits),
    (RejectionKind::StabilityError, stability),
    (RejectionKind::ForceLimitError, force),
];

/// First waypoint vs. current state, per joint.
///
/// # Errors
///
/// Returns [`VerifyError::JointNotInState`] if the state lacks a chunk joint.
pub fn continuity(input: &CheckInput<'_>, metrics: &mut SafetyMetrics) -> Result<Option<Rejection>, VerifyError> {
    let Some(first) = input.chunk.first_waypoint() else {
        return Err(VerifyError::chunk(
            mrcp_kernel::contracts::ContractError::EmptyTrajectory,
        ));
    };
    let mut worst: Option<(&str, f64)> = None;
    for (name, target) in input.chunk.joint_names().iter().zip(first) {
        let current = input
            .state
            .position_of(name)
            .ok_or_else(|| VerifyError::JointNotInState { joint: name.clone() })?;
        let delta = (target - current).abs();
        // Strictly greater keeps the first joint on ties.
        match worst {
            Some((_, d)) if delta <= d => {}
            _ => worst = Some((name.as_str(), delta)),
        }
    }
    let (joint, delta) = worst.unwrap_or(("", 0.0));
    metrics.continuity_error = Some(delta);

    let tolerance = input.thresholds.continuity_tolerance_rad;
    if within_upper(delta, tolerance) {
        Ok(None)
    } else {
        Ok(Some(Rejection::ContinuityError {
            joint: joint.to_string(),
            delta,
            tolerance,
        }))
    }
}

/// Every waypoint's every joint inside the profile range.
///
/// Counts every violation; reports the first in (waypoint, joint) order.
///
/// # Errors
///
/// Returns [`VerifyError::JointNotInProfile`] for an unknown joint.
pub fn joint_limits(input: &CheckInput<'_>, metrics: &mut SafetyMetrics) -> Result<Option<Rejection>, VerifyError> {
    let specs = input
        .chunk
        .joint_names()
        .iter()
        .map(|name| {
            input
                .profile
                .joint(name)
                .ok_or_else(|| VerifyError::JointNotInProfile {
                    joint: name.clone(),
                    robot_id: input.profile.robot_id.clone(),
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut violations: u32 = 0;
    let mut first = None;
    for (index, wp) in input.chunk.waypoints().iter().enumerate() {
        for (spec, &angle) in specs.iter().zip(wp) {
            let inside = angle >= spec.min_rad - COMPARISON_EPSILON
                && angle <= spec.max_rad + COMPARISON_EPSILON;
            if inside {
                continue;
            }
            violations = violations.saturating_add(1);
            if first.is_none() {
                first = Some(Rejection::JointLimitError {
                    waypoint_index: index,
                    joint: spec.name.clone(),
                    angle,
                    min: spec.min_rad,
                    max: spec.max_rad,
                });
            }
        }
    }
    metrics.limit_violations = Some(violations);
    Ok(first)
}

/// ZMP score at or above the threshold.
///
/// # Errors
///
/// Returns [`VerifyError::Encoding`] if the score cannot be rounded.
pub fn stability(input: &CheckInput<'_>, metrics: &mut SafetyMetrics) -> Result<Option<Rejection>, VerifyError> {
    let estimate = zmp::estimate(input.chunk, input.state, input.profile, input.precision)?;
    metrics.zmp_score = Some(estimate.score);
    let threshold = input.thresholds.min_zmp_score;
    if within_lower(estimate.score, threshold) {
        Ok(None)
    } else {
        Ok(Some(Rejection::StabilityError {
            score: estimate.score,
            threshold,
        }))
    }
}

/// Estimated peak force at or below the profile ceiling.
///
/// # Errors
///
/// Infallible; the signature matches [`CheckFn`].
#[allow(clippy::unnecessary_wraps)]
pub fn force(input: &CheckInput<'_>, metrics: &mut SafetyMetrics) -> Result<Option<Rejection>, VerifyError> {
    let estimate = input.chunk.peak_force_n();
    metrics.peak_force = Some(estimate);
    let limit = input.profile.force_ceiling_n;
    if within_upper(estimate, limit) {
        Ok(None)
    } else {
        Ok(Some(Rejection::ForceLimitError { estimate, limit }))
    }
}
