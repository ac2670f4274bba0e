//! The safety verification engine.

use mrcp_kernel::contracts::chunk::JointTrajectoryChunk;
use mrcp_kernel::contracts::profile::RobotProfile;
use mrcp_kernel::contracts::report::{SafetyMetrics, SafetyReport};
use mrcp_kernel::contracts::snapshot::RobotStateSnapshot;
use mrcp_kernel::runtime::config::MAX_FLOAT_PRECISION;
use tracing::debug;

use crate::checks::{CheckInput, CHECK_ORDER};
use crate::config::SafetyThresholds;
use crate::error::VerifyError;

/// Certifies or rejects trajectory chunks against one robot profile.
///
/// Holds only read-only configuration, so one engine may be shared across
/// threads freely.
#[derive(Debug, Clone)]
pub struct SafetyVerificationEngine {
    profile: RobotProfile,
    thresholds: SafetyThresholds,
    precision: u32,
}

impl SafetyVerificationEngine {
    /// # Errors
    ///
    /// Returns [`VerifyError`] if the profile or thresholds are invalid, or
    /// `precision` exceeds the canonical maximum.
    pub fn new(
        profile: RobotProfile,
        thresholds: SafetyThresholds,
        precision: u32,
    ) -> Result<Self, VerifyError> {
        profile.validate().map_err(VerifyError::profile)?;
        thresholds
            .validate()
            .map_err(|detail| VerifyError::Thresholds { detail })?;
        if precision > MAX_FLOAT_PRECISION {
            return Err(VerifyError::Thresholds {
                detail: format!("precision {precision} exceeds {MAX_FLOAT_PRECISION}"),
            });
        }
        Ok(Self {
            profile,
            thresholds,
            precision,
        })
    }

    #[must_use]
    pub fn profile(&self) -> &RobotProfile {
        &self.profile
    }

    #[must_use]
    pub fn thresholds(&self) -> &SafetyThresholds {
        &self.thresholds
    }

    /// Run continuity, joint limits, stability, then force; stop at the first
    /// failure. The report's metrics hold every value computed up to that
    /// point and nothing after it.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError`] for malformed input: an invalid chunk or state,
    /// or a chunk joint missing from the state or the profile. An unsafe
    /// chunk is `Ok` with `valid == false`.
    pub fn verify(
        &self,
        chunk: &JointTrajectoryChunk,
        state: &RobotStateSnapshot,
    ) -> Result<SafetyReport, VerifyError> {
        chunk.validate().map_err(VerifyError::chunk)?;
        state.validate().map_err(VerifyError::state)?;
        for name in chunk.joint_names() {
            if state.position_of(name).is_none() {
                return Err(VerifyError::JointNotInState { joint: name.clone() });
            }
            if self.profile.joint(name).is_none() {
                return Err(VerifyError::JointNotInProfile {
                    joint: name.clone(),
                    robot_id: self.profile.robot_id.clone(),
                });
            }
        }

        let input = CheckInput {
            chunk,
            state,
            profile: &self.profile,
            thresholds: &self.thresholds,
            precision: self.precision,
        };
        let mut metrics = SafetyMetrics::default();
        for (kind, check) in CHECK_ORDER {
            if let Some(rejection) = check(&input, &mut metrics)? {
                debug!(
                    robot_id = %self.profile.robot_id,
                    ordinal = chunk.ordinal(),
                    check = %kind,
                    reason = %rejection,
                    "chunk rejected"
                );
                return Ok(SafetyReport::rejected(rejection, metrics));
            }
        }
        debug!(
            robot_id = %self.profile.robot_id,
            ordinal = chunk.ordinal(),
            "chunk certified"
        );
        Ok(SafetyReport::certified(metrics))
    }
}
