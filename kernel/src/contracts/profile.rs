//! Static robot configuration: joint limits, planar mass model, force ceiling.

use serde::{Deserialize, Serialize};

use super::{check_joint_names, ContractError};
use crate::runtime::canon::{ensure_finite, CanonicalForm, EncodingError};

/// Default gripper/contact force ceiling (N).
pub const DEFAULT_FORCE_CEILING_N: f64 = 100.0;

fn default_force_ceiling() -> f64 {
    DEFAULT_FORCE_CEILING_N
}

/// One joint: angle limits plus the link it drives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JointSpec {
    pub name: String,
    pub min_rad: f64,
    pub max_rad: f64,
    /// Mass of the link distal to this joint (kg).
    #[serde(default)]
    pub link_mass_kg: f64,
    /// Length of the link distal to this joint (m).
    #[serde(default)]
    pub link_length_m: f64,
}

impl JointSpec {
    #[must_use]
    pub fn new(name: impl Into<String>, min_rad: f64, max_rad: f64) -> Self {
        Self {
            name: name.into(),
            min_rad,
            max_rad,
            link_mass_kg: 0.0,
            link_length_m: 0.0,
        }
    }

    #[must_use]
    pub fn with_link(mut self, mass_kg: f64, length_m: f64) -> Self {
        self.link_mass_kg = mass_kg;
        self.link_length_m = length_m;
        self
    }

    #[must_use]
    pub fn contains(&self, angle: f64) -> bool {
        angle >= self.min_rad && angle <= self.max_rad
    }
}

/// Read-only robot profile, loaded once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RobotProfile {
    pub robot_id: String,
    pub joints: Vec<JointSpec>,
    /// Mass of the torso/base carried above the support polygon (kg).
    pub base_mass_kg: f64,
    /// Height of the centre of mass above the floor (m).
    pub com_height_m: f64,
    /// Half-length of the support polygon along the sagittal axis (m).
    pub support_half_length_m: f64,
    #[serde(default = "default_force_ceiling")]
    pub force_ceiling_n: f64,
}

impl RobotProfile {
    /// Seven-joint cobot profile used as the reference configuration.
    ///
    /// Limits follow typical cobot ranges (rounded, not multiples of pi);
    /// link masses decrease distally.
    #[must_use]
    #[allow(clippy::approx_constant)]
    pub fn reference_cobot(robot_id: impl Into<String>) -> Self {
        let specs: [(f64, f64, f64, f64); 7] = [
            (-3.14, 3.14, 4.0, 0.10),
            (-2.0, 2.0, 3.5, 0.40),
            (-3.14, 3.14, 3.0, 0.05),
            (-3.14, 3.14, 2.5, 0.35),
            (-3.14, 3.14, 1.5, 0.05),
            (-3.14, 3.14, 1.0, 0.10),
            (-6.28, 6.28, 0.5, 0.08),
        ];
        let joints = specs
            .iter()
            .enumerate()
            .map(|(i, &(min, max, mass, len))| {
                JointSpec::new(format!("joint_{}", i + 1), min, max).with_link(mass, len)
            })
            .collect();
        Self {
            robot_id: robot_id.into(),
            joints,
            base_mass_kg: 30.0,
            com_height_m: 0.9,
            support_half_length_m: 0.15,
            force_ceiling_n: DEFAULT_FORCE_CEILING_N,
        }
    }

    /// # Errors
    ///
    /// Returns [`ContractError`] if joint names are empty or duplicated, a
    /// limit range is inverted, or a physical constant is non-positive.
    pub fn validate(&self) -> Result<(), ContractError> {
        let names: Vec<String> = self.joints.iter().map(|j| j.name.clone()).collect();
        check_joint_names("robot profile", &names)?;
        self.ensure_finite()?;
        for j in &self.joints {
            if j.min_rad >= j.max_rad {
                return Err(ContractError::OutOfRange {
                    field: format!("joints.{}", j.name),
                    detail: format!("min {} >= max {}", j.min_rad, j.max_rad),
                });
            }
            if j.link_mass_kg < 0.0 || j.link_length_m < 0.0 {
                return Err(ContractError::OutOfRange {
                    field: format!("joints.{}", j.name),
                    detail: "link mass and length must be >= 0".into(),
                });
            }
        }
        for (field, value) in [
            ("com_height_m", self.com_height_m),
            ("support_half_length_m", self.support_half_length_m),
            ("force_ceiling_n", self.force_ceiling_n),
        ] {
            if value <= 0.0 {
                return Err(ContractError::OutOfRange {
                    field: field.into(),
                    detail: format!("{value} must be > 0"),
                });
            }
        }
        if self.base_mass_kg < 0.0 {
            return Err(ContractError::OutOfRange {
                field: "base_mass_kg".into(),
                detail: format!("{} must be >= 0", self.base_mass_kg),
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn joint(&self, name: &str) -> Option<&JointSpec> {
        self.joints.iter().find(|j| j.name == name)
    }

    /// Base mass plus every link mass (kg).
    #[must_use]
    pub fn total_mass_kg(&self) -> f64 {
        self.base_mass_kg + self.joints.iter().map(|j| j.link_mass_kg).sum::<f64>()
    }

    /// Sum of link lengths (m).
    #[must_use]
    pub fn chain_length_m(&self) -> f64 {
        self.joints.iter().map(|j| j.link_length_m).sum()
    }
}

impl CanonicalForm for RobotProfile {
    fn ensure_finite(&self) -> Result<(), EncodingError> {
        for j in &self.joints {
            ensure_finite(&format!("joints.{}.min_rad", j.name), j.min_rad)?;
            ensure_finite(&format!("joints.{}.max_rad", j.name), j.max_rad)?;
            ensure_finite(&format!("joints.{}.link_mass_kg", j.name), j.link_mass_kg)?;
            ensure_finite(&format!("joints.{}.link_length_m", j.name), j.link_length_m)?;
        }
        ensure_finite("base_mass_kg", self.base_mass_kg)?;
        ensure_finite("com_height_m", self.com_height_m)?;
        ensure_finite("support_half_length_m", self.support_half_length_m)?;
        ensure_finite("force_ceiling_n", self.force_ceiling_n)
    }
}
