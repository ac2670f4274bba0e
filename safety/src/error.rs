//! Typed verification errors.
//!
//! `VerifyError` means the input could not be judged at all. An unsafe but
//! well-formed chunk is never an error; it is a rejected
//! [`mrcp_kernel::contracts::report::SafetyReport`].

use mrcp_kernel::contracts::ContractError;
use mrcp_kernel::runtime::canon::EncodingError;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum VerifyError {
    /// The chunk, state, or profile failed shape validation.
    #[error("invalid {subject}: {source}")]
    Contract {
        subject: &'static str,
        source: ContractError,
    },
    /// The chunk moves a joint the current state does not report.
    #[error("joint `{joint}` is in the chunk but not in the current state")]
    JointNotInState { joint: String },
    /// The chunk moves a joint the robot profile does not define.
    #[error("joint `{joint}` is not defined by robot profile `{robot_id}`")]
    JointNotInProfile { joint: String, robot_id: String },
    /// Thresholds are out of range.
    #[error("invalid safety thresholds: {detail}")]
    Thresholds { detail: String },
    /// A computed metric could not be rounded.
    #[error(transparent)]
    Encoding(#[from] EncodingError),
}

impl VerifyError {
    pub(crate) fn chunk(source: ContractError) -> Self {
        Self::Contract {
            subject: "chunk",
            source,
        }
    }

    pub(crate) fn state(source: ContractError) -> Self {
        Self::Contract {
            subject: "robot state",
            source,
        }
    }

    pub(crate) fn profile(source: ContractError) -> Self {
        Self::Contract {
            subject: "robot profile",
            source,
        }
    }
}
