//! Verification thresholds.

use serde::{Deserialize, Serialize};

/// Fixed epsilon for every boundary comparison; boundaries are inclusive.
pub const COMPARISON_EPSILON: f64 = 1e-9;

/// Tunable thresholds for the continuity and stability checks.
///
/// The force ceiling lives on the robot profile, not here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SafetyThresholds {
    /// Largest allowed start offset per joint (rad).
    pub continuity_tolerance_rad: f64,
    /// Lowest acceptable ZMP stability score.
    pub min_zmp_score: f64,
}

impl Default for SafetyThresholds {
    fn default() -> Self {
        Self {
            continuity_tolerance_rad: 0.1,
            min_zmp_score: 0.4,
        }
    }
}

impl SafetyThresholds {
    /// # Errors
    ///
    /// Returns a description of the first out-of-range threshold.
    pub fn validate(&self) -> Result<(), String> {
        if !self.continuity_tolerance_rad.is_finite() || self.continuity_tolerance_rad < 0.0 {
            return Err(format!(
                "continuity_tolerance_rad must be finite and >= 0, got {}",
                self.continuity_tolerance_rad
            ));
        }
        if !(0.0..=1.0).contains(&self.min_zmp_score) {
            return Err(format!(
                "min_zmp_score must lie in [0, 1], got {}",
                self.min_zmp_score
            ));
        }
        Ok(())
    }
}

/// `value <= limit`, tolerating [`COMPARISON_EPSILON`] of float noise.
#[must_use]
pub fn within_upper(value: f64, limit: f64) -> bool {
    value <= limit + COMPARISON_EPSILON
}

/// `value >= limit`, tolerating [`COMPARISON_EPSILON`] of float noise.
#[must_use]
pub fn within_lower(value: f64, limit: f64) -> bool {
    value >= limit - COMPARISON_EPSILON
}
