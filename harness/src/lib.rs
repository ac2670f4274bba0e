//! MRCP harness: orchestration around the kernel and the safety gate.
//!
//! The harness turns (instruction, snapshots) into stable identifiers,
//! sends every candidate chunk through [`mrcp_safety`], and executes only
//! certified chunks through an [`execution::ExecutionAdapter`].
//!
//! The harness does NOT decide safety; it delegates to the engine.
//! Planning tiers plug in through [`orchestrator::ChunkSource`].

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]

pub mod cache;
pub mod config;
pub mod execution;
pub mod memo;
pub mod orchestrator;
pub mod persist;
pub mod status;

pub use config::{ConfigError, PipelineConfig};
pub use execution::{AdapterError, ExecutionAdapter, ExecutionBackend, ExecutionMode};
pub use orchestrator::{ChunkSource, PipelineError, PipelineOrchestrator, PlanRequest, PlanSummary};
