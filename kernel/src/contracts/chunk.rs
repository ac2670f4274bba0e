//! Joint trajectory chunks: the unit of motion that is verified and executed.

use serde::{Deserialize, Serialize};

use super::{check_arity, check_joint_names, ContractError, SCHEMA_VERSION};
use crate::runtime::canon::{ensure_all_finite, ensure_finite, CanonicalForm, EncodingError};

/// One segment of a motion trajectory.
///
/// Produced by the (external) planning tiers; never trusted, always
/// re-validated before execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JointTrajectoryChunk {
    /// Position of this chunk within its plan.
    ordinal: u32,
    joint_names: Vec<String>,
    /// Ordered joint-angle vectors (rad), each aligned with `joint_names`.
    waypoints: Vec<Vec<f64>>,
    /// Expected seconds to complete the whole chunk.
    duration_s: f64,
    /// Estimated peak gripper/contact force (N).
    peak_force_n: f64,
    description: String,
    schema_version: String,
}

impl JointTrajectoryChunk {
    /// # Errors
    ///
    /// Returns [`ContractError`] if the chunk is malformed: empty or duplicate
    /// joint names, no waypoints, a waypoint of the wrong arity, a
    /// non-positive duration, a negative force, or a non-finite number.
    pub fn new(
        ordinal: u32,
        joint_names: Vec<String>,
        waypoints: Vec<Vec<f64>>,
        duration_s: f64,
        peak_force_n: f64,
    ) -> Result<Self, ContractError> {
        let chunk = Self {
            ordinal,
            joint_names,
            waypoints,
            duration_s,
            peak_force_n,
            description: String::new(),
            schema_version: SCHEMA_VERSION.to_string(),
        };
        chunk.validate()?;
        Ok(chunk)
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// # Errors
    ///
    /// Returns the first [`ContractError`] found.
    pub fn validate(&self) -> Result<(), ContractError> {
        check_joint_names("trajectory chunk", &self.joint_names)?;
        if self.waypoints.is_empty() {
            return Err(ContractError::EmptyTrajectory);
        }
        for (i, wp) in self.waypoints.iter().enumerate() {
            check_arity(&format!("waypoints[{i}]"), self.joint_names.len(), wp.len())?;
        }
        self.ensure_finite()?;
        if self.duration_s <= 0.0 {
            return Err(ContractError::OutOfRange {
                field: "duration_s".into(),
                detail: format!("{} must be > 0", self.duration_s),
            });
        }
        if self.peak_force_n < 0.0 {
            return Err(ContractError::OutOfRange {
                field: "peak_force_n".into(),
                detail: format!("{} must be >= 0", self.peak_force_n),
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn ordinal(&self) -> u32 {
        self.ordinal
    }

    #[must_use]
    pub fn joint_names(&self) -> &[String] {
        &self.joint_names
    }

    #[must_use]
    pub fn waypoints(&self) -> &[Vec<f64>] {
        &self.waypoints
    }

    #[must_use]
    pub fn duration_s(&self) -> f64 {
        self.duration_s
    }

    #[must_use]
    pub fn peak_force_n(&self) -> f64 {
        self.peak_force_n
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// First waypoint. Validated chunks always have one.
    #[must_use]
    pub fn first_waypoint(&self) -> Option<&[f64]> {
        self.waypoints.first().map(Vec::as_slice)
    }

    /// Final waypoint. Validated chunks always have one.
    #[must_use]
    pub fn final_waypoint(&self) -> Option<&[f64]> {
        self.waypoints.last().map(Vec::as_slice)
    }

    /// Evenly spaced `time_from_start` (s) for every waypoint; the last
    /// waypoint lands exactly on `duration_s`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn waypoint_times(&self) -> Vec<f64> {
        let n = self.waypoints.len();
        (1..=n)
            .map(|i| {
                if i == n {
                    self.duration_s
                } else {
                    self.duration_s * i as f64 / n as f64
                }
            })
            .collect()
    }

    /// Total duration in integer nanoseconds (rounded, saturating).
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    pub fn duration_nanos(&self) -> u64 {
        let nanos = (self.duration_s * 1e9).round();
        if nanos <= 0.0 {
            0
        } else if nanos >= u64::MAX as f64 {
            u64::MAX
        } else {
            nanos as u64
        }
    }
}

impl CanonicalForm for JointTrajectoryChunk {
    fn ensure_finite(&self) -> Result<(), EncodingError> {
        for (i, wp) in self.waypoints.iter().enumerate() {
            ensure_all_finite(&format!("waypoints[{i}]"), wp)?;
        }
        ensure_finite("duration_s", self.duration_s)?;
        ensure_finite("peak_force_n", self.peak_force_n)
    }
}
