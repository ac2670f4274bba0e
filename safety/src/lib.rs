//! MRCP Safety: the deterministic gate between a candidate chunk and an actuator.
//!
//! This crate depends only on `mrcp_kernel`. It holds no learned model and
//! no shared mutable state: [`SafetyVerificationEngine::verify`] is a pure
//! function of (chunk, current state, robot profile, thresholds).
//!
//! # Crate dependency graph
//!
//! ```text
//! mrcp_kernel  ←  mrcp_safety  ←  mrcp_harness
//! (contracts)     (four checks)    (orchestrator, execution)
//! ```
//!
//! # Key types
//!
//! - [`SafetyVerificationEngine`] -- runs the checks in fixed order
//! - [`SafetyThresholds`] -- continuity tolerance and minimum ZMP score
//! - [`VerifyError`] -- malformed input (never an unsafe-but-valid chunk)
//! - [`zmp::ZmpEstimate`] -- cart-table stability estimate

#![forbid(unsafe_code)]

pub mod checks;
pub mod config;
pub mod engine;
pub mod error;
pub mod zmp;

pub use config::SafetyThresholds;
pub use engine::SafetyVerificationEngine;
pub use error::VerifyError;
