//! Execution results stored in the idempotency cache.

use serde::{Deserialize, Serialize};

use super::ids::{ChunkId, PlanId};
use super::report::SafetyReport;
use super::snapshot::RobotStateSnapshot;
use crate::runtime::canon::{CanonicalForm, EncodingError};

/// How a result was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionOutcome {
    /// The backend ran the chunk to completion.
    Executed,
    /// The safety gate refused the chunk; nothing was dispatched.
    Rejected,
    /// A stored result was returned without invoking the backend.
    Cached,
    /// The backend was invoked and did not complete.
    Failed,
}

impl std::fmt::Display for ExecutionOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Executed => "executed",
            Self::Rejected => "rejected",
            Self::Cached => "cached",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Recoverable execution failure class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    ExecutionTimeout,
    ChannelDisconnected,
    GoalRejected,
    GoalAborted,
    Cancelled,
    /// The controller reported success with an unusable final state.
    InvalidFeedback,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::ExecutionTimeout => "ExecutionTimeout",
            Self::ChannelDisconnected => "ChannelDisconnected",
            Self::GoalRejected => "GoalRejected",
            Self::GoalAborted => "GoalAborted",
            Self::Cancelled => "Cancelled",
            Self::InvalidFeedback => "InvalidFeedback",
        };
        f.write_str(name)
    }
}

/// Whether any motion may have reached the actuators before the failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotionApplied {
    /// The goal was never accepted; the robot did not move.
    NotApplied,
    /// The goal was accepted and motion started.
    Partial,
    /// The channel gives no way to tell.
    Unknown,
}

/// Failure record attached to a `failed` result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecutionFailure {
    pub kind: FailureKind,
    pub motion: MotionApplied,
    pub detail: String,
    /// Action result code, when the channel produced one.
    pub error_code: Option<i32>,
}

impl ExecutionFailure {
    #[must_use]
    pub fn new(kind: FailureKind, motion: MotionApplied, detail: impl Into<String>) -> Self {
        Self {
            kind,
            motion,
            detail: detail.into(),
            error_code: None,
        }
    }

    #[must_use]
    pub fn with_error_code(mut self, code: i32) -> Self {
        self.error_code = Some(code);
        self
    }

    /// True when a retry under the same identifiers could move the robot twice.
    #[must_use]
    pub fn may_have_moved(&self) -> bool {
        self.motion != MotionApplied::NotApplied
    }
}

impl std::fmt::Display for ExecutionFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.detail)?;
        if let Some(code) = self.error_code {
            write!(f, " (error code {code})")?;
        }
        Ok(())
    }
}

/// The one canonical record of what happened to a chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecutionResult {
    plan_id: PlanId,
    chunk_id: ChunkId,
    outcome: ExecutionOutcome,
    final_state: RobotStateSnapshot,
    logical_duration_ns: u64,
    /// Measured only by the hardware backend; zero elsewhere.
    wall_duration_ms: u64,
    failure: Option<ExecutionFailure>,
    safety_report: Option<SafetyReport>,
}

impl ExecutionResult {
    #[must_use]
    pub fn executed(
        plan_id: PlanId,
        chunk_id: ChunkId,
        final_state: RobotStateSnapshot,
        logical_duration_ns: u64,
        wall_duration_ms: u64,
    ) -> Self {
        Self {
            plan_id,
            chunk_id,
            outcome: ExecutionOutcome::Executed,
            final_state,
            logical_duration_ns,
            wall_duration_ms,
            failure: None,
            safety_report: None,
        }
    }

    /// A failed dispatch. `last_known_state` is whatever the backend last
    /// observed (the starting state when nothing was reported).
    #[must_use]
    pub fn failed(
        plan_id: PlanId,
        chunk_id: ChunkId,
        last_known_state: RobotStateSnapshot,
        failure: ExecutionFailure,
        wall_duration_ms: u64,
    ) -> Self {
        Self {
            plan_id,
            chunk_id,
            outcome: ExecutionOutcome::Failed,
            final_state: last_known_state,
            logical_duration_ns: 0,
            wall_duration_ms,
            failure: Some(failure),
            safety_report: None,
        }
    }

    /// A safety rejection: the robot stays where it was.
    #[must_use]
    pub fn rejected(
        plan_id: PlanId,
        chunk_id: ChunkId,
        current_state: RobotStateSnapshot,
        report: SafetyReport,
    ) -> Self {
        Self {
            plan_id,
            chunk_id,
            outcome: ExecutionOutcome::Rejected,
            final_state: current_state,
            logical_duration_ns: 0,
            wall_duration_ms: 0,
            failure: None,
            safety_report: Some(report),
        }
    }

    /// The same payload, marked as served from the cache.
    #[must_use]
    pub fn as_cached(&self) -> Self {
        Self {
            outcome: ExecutionOutcome::Cached,
            ..self.clone()
        }
    }

    /// Equality on everything except `outcome`.
    #[must_use]
    pub fn same_payload(&self, other: &Self) -> bool {
        self.plan_id == other.plan_id
            && self.chunk_id == other.chunk_id
            && self.final_state == other.final_state
            && self.logical_duration_ns == other.logical_duration_ns
            && self.wall_duration_ms == other.wall_duration_ms
            && self.failure == other.failure
            && self.safety_report == other.safety_report
    }

    #[must_use]
    pub fn plan_id(&self) -> &PlanId {
        &self.plan_id
    }

    #[must_use]
    pub fn chunk_id(&self) -> &ChunkId {
        &self.chunk_id
    }

    #[must_use]
    pub fn outcome(&self) -> ExecutionOutcome {
        self.outcome
    }

    #[must_use]
    pub fn final_state(&self) -> &RobotStateSnapshot {
        &self.final_state
    }

    #[must_use]
    pub fn logical_duration_ns(&self) -> u64 {
        self.logical_duration_ns
    }

    #[must_use]
    pub fn wall_duration_ms(&self) -> u64 {
        self.wall_duration_ms
    }

    #[must_use]
    pub fn failure(&self) -> Option<&ExecutionFailure> {
        self.failure.as_ref()
    }

    #[must_use]
    pub fn safety_report(&self) -> Option<&SafetyReport> {
        self.safety_report.as_ref()
    }

    /// Human-readable reason for anything other than a clean execution.
    #[must_use]
    pub fn reason_text(&self) -> Option<String> {
        if let Some(report) = &self.safety_report {
            return Some(report.reason_text());
        }
        self.failure.as_ref().map(ToString::to_string)
    }
}

impl CanonicalForm for ExecutionResult {
    fn ensure_finite(&self) -> Result<(), EncodingError> {
        self.final_state.ensure_finite()?;
        if let Some(report) = &self.safety_report {
            report.ensure_finite()?;
        }
        Ok(())
    }
}
