//! Safety verification reports.

use serde::{Deserialize, Serialize};

use crate::runtime::canon::{ensure_finite, CanonicalForm, EncodingError};

/// The fixed rejection-reason enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RejectionKind {
    ContinuityError,
    JointLimitError,
    StabilityError,
    ForceLimitError,
}

impl std::fmt::Display for RejectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::ContinuityError => "ContinuityError",
            Self::JointLimitError => "JointLimitError",
            Self::StabilityError => "StabilityError",
            Self::ForceLimitError => "ForceLimitError",
        };
        f.write_str(name)
    }
}

/// The first violation found by verification, with its detail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Rejection {
    /// First waypoint too far from the current state.
    ContinuityError {
        joint: String,
        delta: f64,
        tolerance: f64,
    },
    /// A waypoint angle outside the profile limits.
    JointLimitError {
        waypoint_index: usize,
        joint: String,
        angle: f64,
        min: f64,
        max: f64,
    },
    /// ZMP stability score below threshold.
    StabilityError { score: f64, threshold: f64 },
    /// Estimated peak force above the profile ceiling.
    ForceLimitError { estimate: f64, limit: f64 },
}

impl Rejection {
    #[must_use]
    pub fn kind(&self) -> RejectionKind {
        match self {
            Self::ContinuityError { .. } => RejectionKind::ContinuityError,
            Self::JointLimitError { .. } => RejectionKind::JointLimitError,
            Self::StabilityError { .. } => RejectionKind::StabilityError,
            Self::ForceLimitError { .. } => RejectionKind::ForceLimitError,
        }
    }
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ContinuityError {
                joint,
                delta,
                tolerance,
            } => write!(
                f,
                "ContinuityError: {joint} starts {delta:.4} rad from current state (tolerance {tolerance:.4} rad)"
            ),
            Self::JointLimitError {
                waypoint_index,
                joint,
                angle,
                min,
                max,
            } => write!(
                f,
                "JointLimitError: waypoint {waypoint_index} {joint} = {angle:.4} rad not in [{min}, {max}]"
            ),
            Self::StabilityError { score, threshold } => write!(
                f,
                "StabilityError: ZMP score {score:.4} below threshold {threshold:.4}"
            ),
            Self::ForceLimitError { estimate, limit } => write!(
                f,
                "ForceLimitError: peak force {estimate:.2} N exceeds limit {limit:.2} N"
            ),
        }
    }
}

impl CanonicalForm for Rejection {
    fn ensure_finite(&self) -> Result<(), EncodingError> {
        match self {
            Self::ContinuityError {
                delta, tolerance, ..
            } => {
                ensure_finite("delta", *delta)?;
                ensure_finite("tolerance", *tolerance)
            }
            Self::JointLimitError { angle, min, max, .. } => {
                ensure_finite("angle", *angle)?;
                ensure_finite("min", *min)?;
                ensure_finite("max", *max)
            }
            Self::StabilityError { score, threshold } => {
                ensure_finite("score", *score)?;
                ensure_finite("threshold", *threshold)
            }
            Self::ForceLimitError { estimate, limit } => {
                ensure_finite("estimate", *estimate)?;
                ensure_finite("limit", *limit)
            }
        }
    }
}

/// Diagnostic values computed during verification.
///
/// A field is `None` when its check was never reached.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SafetyMetrics {
    /// Largest per-joint start offset (rad).
    pub continuity_error: Option<f64>,
    /// ZMP stability score in `[0, 1]`.
    pub zmp_score: Option<f64>,
    /// Estimated peak force (N).
    pub peak_force: Option<f64>,
    /// Count of waypoint-joint pairs outside limits.
    pub limit_violations: Option<u32>,
}

impl CanonicalForm for SafetyMetrics {
    fn ensure_finite(&self) -> Result<(), EncodingError> {
        for (field, value) in [
            ("continuity_error", self.continuity_error),
            ("zmp_score", self.zmp_score),
            ("peak_force", self.peak_force),
        ] {
            if let Some(v) = value {
                ensure_finite(field, v)?;
            }
        }
        Ok(())
    }
}

/// Certify/reject decision for one chunk.
///
/// Invariant: `valid` is true exactly when `reason` is `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyReport {
    valid: bool,
    reason: Option<Rejection>,
    metrics: SafetyMetrics,
}

impl SafetyReport {
    #[must_use]
    pub fn certified(metrics: SafetyMetrics) -> Self {
        Self {
            valid: true,
            reason: None,
            metrics,
        }
    }

    #[must_use]
    pub fn rejected(reason: Rejection, metrics: SafetyMetrics) -> Self {
        Self {
            valid: false,
            reason: Some(reason),
            metrics,
        }
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    #[must_use]
    pub fn reason(&self) -> Option<&Rejection> {
        self.reason.as_ref()
    }

    #[must_use]
    pub fn rejection_kind(&self) -> Option<RejectionKind> {
        self.reason.as_ref().map(Rejection::kind)
    }

    #[must_use]
    pub fn metrics(&self) -> &SafetyMetrics {
        &self.metrics
    }

    /// Human-readable reason string.
    #[must_use]
    pub fn reason_text(&self) -> String {
        match &self.reason {
            Some(r) => r.to_string(),
            None => "certified".to_string(),
        }
    }
}

impl CanonicalForm for SafetyReport {
    fn ensure_finite(&self) -> Result<(), EncodingError> {
        if let Some(r) = &self.reason {
            r.ensure_finite()?;
        }
        self.metrics.ensure_finite()
    }
}
