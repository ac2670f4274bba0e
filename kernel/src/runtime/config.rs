//! Process-wide determinism configuration.

use serde::{Deserialize, Serialize};

use super::canon::{CanonicalForm, EncodingError};
use super::clock::{ClockMode, LogicalTime};

/// Largest supported float rounding precision (decimal places).
///
/// Bounded so that `x * 10^precision` stays exactly representable for the
/// magnitudes contract values carry (joint angles, forces, seconds).
pub const MAX_FLOAT_PRECISION: u32 = 12;

/// Global configuration for deterministic execution.
///
/// Set once at startup and never mutated. Its canonical digest is bound into
/// every plan id, so changing any field changes every derived identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeterminismConfig {
    /// Seed for every [`super::rng::DeterministicRng`] derived from the runtime.
    pub seed: u64,
    /// Decimal places floats are rounded to before hashing.
    pub float_precision: u32,
    /// Initial logical-clock mode.
    pub clock_mode: ClockMode,
    /// Logical time the clock starts at.
    pub frozen_epoch: LogicalTime,
}

impl Default for DeterminismConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            float_precision: 6,
            clock_mode: ClockMode::Frozen,
            frozen_epoch: LogicalTime::ZERO,
        }
    }
}

impl DeterminismConfig {
    /// # Errors
    ///
    /// Returns [`EncodingError::PrecisionOutOfRange`] if `float_precision`
    /// exceeds [`MAX_FLOAT_PRECISION`].
    pub fn validate(&self) -> Result<(), EncodingError> {
        if self.float_precision > MAX_FLOAT_PRECISION {
            return Err(EncodingError::PrecisionOutOfRange {
                precision: self.float_precision,
                max: MAX_FLOAT_PRECISION,
            });
        }
        Ok(())
    }
}

impl CanonicalForm for DeterminismConfig {
    fn ensure_finite(&self) -> Result<(), EncodingError> {
        Ok(())
    }
}
