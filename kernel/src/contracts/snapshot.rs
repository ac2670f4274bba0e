//! Frozen captures of robot and world state at one logical instant.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{check_arity, check_joint_names, ContractError, SCHEMA_VERSION};
use crate::runtime::canon::{
    ensure_all_finite, ensure_finite, round_to_precision, CanonicalForm, EncodingError,
};
use crate::runtime::clock::LogicalTime;

/// Deterministic snapshot of the robot's physical state.
///
/// Joint positions are in radians and ordered consistently with
/// `joint_names`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RobotStateSnapshot {
    joint_names: Vec<String>,
    joint_positions: Vec<f64>,
    joint_velocities: Option<Vec<f64>>,
    /// Base (floor) velocity in m/s.
    base_velocity: f64,
    /// Carried payload in kg.
    payload_kg: f64,
    captured_at: LogicalTime,
    schema_version: String,
}

impl RobotStateSnapshot {
    /// # Errors
    ///
    /// Returns [`ContractError`] if names are empty or duplicated, arities
    /// disagree, or a position is non-finite.
    pub fn new(
        joint_names: Vec<String>,
        joint_positions: Vec<f64>,
        captured_at: LogicalTime,
    ) -> Result<Self, ContractError> {
        let snapshot = Self {
            joint_names,
            joint_positions,
            joint_velocities: None,
            base_velocity: 0.0,
            payload_kg: 0.0,
            captured_at,
            schema_version: SCHEMA_VERSION.to_string(),
        };
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Attach joint velocities.
    ///
    /// # Errors
    ///
    /// Returns [`ContractError`] if the velocity arity is wrong or non-finite.
    pub fn with_velocities(mut self, velocities: Vec<f64>) -> Result<Self, ContractError> {
        self.joint_velocities = Some(velocities);
        self.validate()?;
        Ok(self)
    }

    /// Attach base velocity (m/s) and payload mass (kg).
    ///
    /// # Errors
    ///
    /// Returns [`ContractError`] if either value is non-finite or negative.
    pub fn with_base_motion(mut self, base_velocity: f64, payload_kg: f64) -> Result<Self, ContractError> {
        self.base_velocity = base_velocity;
        self.payload_kg = payload_kg;
        self.validate()?;
        Ok(self)
    }

    /// A new snapshot with the same joints at new positions and capture time.
    /// Velocities are dropped (unknown after the transition).
    ///
    /// # Errors
    ///
    /// Returns [`ContractError`] if `positions` has the wrong arity.
    pub fn advanced_to(&self, positions: Vec<f64>, captured_at: LogicalTime) -> Result<Self, ContractError> {
        let next = Self {
            joint_names: self.joint_names.clone(),
            joint_positions: positions,
            joint_velocities: None,
            base_velocity: self.base_velocity,
            payload_kg: self.payload_kg,
            captured_at,
            schema_version: self.schema_version.clone(),
        };
        next.validate()?;
        Ok(next)
    }

    /// This snapshot with every float replaced by its canonical value, so
    /// two snapshots with equal canonical bytes compare equal.
    ///
    /// # Errors
    ///
    /// Returns [`EncodingError`] for a non-finite value or a precision out
    /// of range.
    pub fn rounded(&self, precision: u32) -> Result<Self, EncodingError> {
        let round_all = |values: &[f64]| {
            values
                .iter()
                .map(|&v| round_to_precision(v, precision))
                .collect::<Result<Vec<_>, _>>()
        };
        Ok(Self {
            joint_names: self.joint_names.clone(),
            joint_positions: round_all(&self.joint_positions)?,
            joint_velocities: self.joint_velocities.as_deref().map(round_all).transpose()?,
            base_velocity: round_to_precision(self.base_velocity, precision)?,
            payload_kg: round_to_precision(self.payload_kg, precision)?,
            captured_at: self.captured_at,
            schema_version: self.schema_version.clone(),
        })
    }

    /// Re-check every invariant (required after deserialization).
    ///
    /// # Errors
    ///
    /// Returns the first [`ContractError`] found.
    pub fn validate(&self) -> Result<(), ContractError> {
        check_joint_names("robot state", &self.joint_names)?;
        check_arity("joint_positions", self.joint_names.len(), self.joint_positions.len())?;
        if let Some(v) = &self.joint_velocities {
            check_arity("joint_velocities", self.joint_names.len(), v.len())?;
        }
        self.ensure_finite()?;
        if self.payload_kg < 0.0 {
            return Err(ContractError::OutOfRange {
                field: "payload_kg".into(),
                detail: format!("{} < 0", self.payload_kg),
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn joint_names(&self) -> &[String] {
        &self.joint_names
    }

    #[must_use]
    pub fn joint_positions(&self) -> &[f64] {
        &self.joint_positions
    }

    #[must_use]
    pub fn joint_velocities(&self) -> Option<&[f64]> {
        self.joint_velocities.as_deref()
    }

    #[must_use]
    pub fn base_velocity(&self) -> f64 {
        self.base_velocity
    }

    #[must_use]
    pub fn payload_kg(&self) -> f64 {
        self.payload_kg
    }

    #[must_use]
    pub fn captured_at(&self) -> LogicalTime {
        self.captured_at
    }

    #[must_use]
    pub fn schema_version(&self) -> &str {
        &self.schema_version
    }

    /// Position of a named joint.
    #[must_use]
    pub fn position_of(&self, joint: &str) -> Option<f64> {
        self.joint_names
            .iter()
            .position(|n| n == joint)
            .map(|i| self.joint_positions[i])
    }

    /// Joint positions keyed by name.
    #[must_use]
    pub fn positions_by_name(&self) -> BTreeMap<&str, f64> {
        self.joint_names
            .iter()
            .map(String::as_str)
            .zip(self.joint_positions.iter().copied())
            .collect()
    }
}

impl CanonicalForm for RobotStateSnapshot {
    fn ensure_finite(&self) -> Result<(), EncodingError> {
        ensure_all_finite("joint_positions", &self.joint_positions)?;
        if let Some(v) = &self.joint_velocities {
            ensure_all_finite("joint_velocities", v)?;
        }
        ensure_finite("base_velocity", self.base_velocity)?;
        ensure_finite("payload_kg", self.payload_kg)
    }
}

/// One object reported by perception.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DetectedObject {
    pub label: String,
    /// Position in the robot base frame (m).
    pub position_m: [f64; 3],
    pub mass_kg: Option<f64>,
    pub friction_coefficient: Option<f64>,
}

impl DetectedObject {
    #[must_use]
    pub fn new(label: impl Into<String>, position_m: [f64; 3]) -> Self {
        Self {
            label: label.into(),
            position_m,
            mass_kg: None,
            friction_coefficient: None,
        }
    }
}

impl CanonicalForm for DetectedObject {
    fn ensure_finite(&self) -> Result<(), EncodingError> {
        ensure_all_finite("position_m", &self.position_m)?;
        if let Some(m) = self.mass_kg {
            ensure_finite("mass_kg", m)?;
        }
        if let Some(f) = self.friction_coefficient {
            ensure_finite("friction_coefficient", f)?;
        }
        Ok(())
    }
}

/// Deterministic summary of the robot's sensory inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PerceptionSnapshot {
    camera_frame_digest: String,
    detected_objects: Vec<DetectedObject>,
    tactile_summary: BTreeMap<String, f64>,
    captured_at: LogicalTime,
    schema_version: String,
}

impl PerceptionSnapshot {
    #[must_use]
    pub fn new(camera_frame_digest: impl Into<String>, captured_at: LogicalTime) -> Self {
        Self {
            camera_frame_digest: camera_frame_digest.into(),
            detected_objects: Vec::new(),
            tactile_summary: BTreeMap::new(),
            captured_at,
            schema_version: SCHEMA_VERSION.to_string(),
        }
    }

    /// # Errors
    ///
    /// Returns [`ContractError`] if an object carries a non-finite number.
    pub fn with_objects(mut self, objects: Vec<DetectedObject>) -> Result<Self, ContractError> {
        self.detected_objects = objects;
        self.validate()?;
        Ok(self)
    }

    /// # Errors
    ///
    /// Returns [`ContractError`] if a reading is non-finite.
    pub fn with_tactile(mut self, summary: BTreeMap<String, f64>) -> Result<Self, ContractError> {
        self.tactile_summary = summary;
        self.validate()?;
        Ok(self)
    }

    /// # Errors
    ///
    /// Returns [`ContractError`] if the camera digest is empty or a number is
    /// non-finite.
    pub fn validate(&self) -> Result<(), ContractError> {
        if self.camera_frame_digest.is_empty() {
            return Err(ContractError::OutOfRange {
                field: "camera_frame_digest".into(),
                detail: "empty".into(),
            });
        }
        self.ensure_finite()?;
        Ok(())
    }

    #[must_use]
    pub fn camera_frame_digest(&self) -> &str {
        &self.camera_frame_digest
    }

    #[must_use]
    pub fn detected_objects(&self) -> &[DetectedObject] {
        &self.detected_objects
    }

    #[must_use]
    pub fn tactile_summary(&self) -> &BTreeMap<String, f64> {
        &self.tactile_summary
    }

    #[must_use]
    pub fn captured_at(&self) -> LogicalTime {
        self.captured_at
    }
}

impl CanonicalForm for PerceptionSnapshot {
    fn ensure_finite(&self) -> Result<(), EncodingError> {
        self.detected_objects.ensure_finite()?;
        for (name, value) in &self.tactile_summary {
            ensure_finite(&format!("tactile_summary.{name}"), *value)?;
        }
        Ok(())
    }
}
