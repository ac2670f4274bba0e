//! Immutable contract values shared by every tier.
//!
//! Construction validates shape (arity, uniqueness, finiteness). After
//! construction no method mutates a value; "changes" produce a new value.
//! Values loaded through `serde` must be re-checked with `validate()`.

pub mod chunk;
pub mod execution;
pub mod ids;
pub mod profile;
pub mod report;
pub mod snapshot;

use crate::runtime::canon::EncodingError;

/// Schema version stamped on every snapshot and chunk.
pub const SCHEMA_VERSION: &str = "2.0.0";

/// Shape violation in a contract value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContractError {
    /// A joint-name list was empty.
    #[error("{context}: joint names cannot be empty")]
    EmptyJointNames { context: &'static str },
    /// A joint name appeared twice.
    #[error("{context}: duplicate joint name `{name}`")]
    DuplicateJoint { context: &'static str, name: String },
    /// Two parallel lists disagree in length.
    #[error("{field}: expected {expected} values, got {actual}")]
    ArityMismatch {
        field: String,
        expected: usize,
        actual: usize,
    },
    /// A trajectory chunk carried no waypoints.
    #[error("trajectory chunk has no waypoints")]
    EmptyTrajectory,
    /// A numeric field was outside its admissible range.
    #[error("{field} out of range: {detail}")]
    OutOfRange { field: String, detail: String },
    /// A float was NaN or infinite.
    #[error(transparent)]
    Encoding(#[from] EncodingError),
}

/// Reject empty or duplicated joint-name lists.
pub(crate) fn check_joint_names(context: &'static str, names: &[String]) -> Result<(), ContractError> {
    if names.is_empty() {
        return Err(ContractError::EmptyJointNames { context });
    }
    let mut seen = std::collections::BTreeSet::new();
    for name in names {
        if !seen.insert(name.as_str()) {
            return Err(ContractError::DuplicateJoint {
                context,
                name: name.clone(),
            });
        }
    }
    Ok(())
}

pub(crate) fn check_arity(field: &str, expected: usize, actual: usize) -> Result<(), ContractError> {
    if expected == actual {
        Ok(())
    } else {
        Err(ContractError::ArityMismatch {
            field: field.to_string(),
            expected,
            actual,
        })
    }
}
