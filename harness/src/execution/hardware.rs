//! Hardware backend: an action-style goal/result exchange with a real
//! trajectory controller.
//!
//! This is the one place in the workspace that measures wall-clock time.
//! Timing and intermediate states observed here are not deterministic and
//! never feed back into identifiers or verification.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use mrcp_kernel::contracts::chunk::JointTrajectoryChunk;
use mrcp_kernel::contracts::execution::{ExecutionFailure, FailureKind, MotionApplied};
use mrcp_kernel::contracts::snapshot::RobotStateSnapshot;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};


/// Default bound on one goal's completion.
pub const DEFAULT_RESULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Goal message sent to the trajectory controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryGoalV1 {
    pub joint_names: Vec<String>,
    pub waypoints: Vec<Vec<f64>>,
    /// Seconds from goal start at which each waypoint is reached.
    pub time_from_start: Vec<f64>,
}

impl TrajectoryGoalV1 {
    #[must_use]
    pub fn from_chunk(chunk: &JointTrajectoryChunk) -> Self {
        Self {
            joint_names: chunk.joint_names().to_vec(),
            waypoints: chunk.waypoints().to_vec(),
            time_from_start: chunk.waypoint_times(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reliability {
    Reliable,
    BestEffort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Durability {
    Volatile,
    TransientLocal,
}

/// Quality-of-service profile for one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QosProfile {
    pub reliability: Reliability,
    pub durability: Durability,
    /// Keep-last history depth.
    pub depth: usize,
}

impl QosProfile {
    /// Commands: reliable, keep-last 10, volatile.
    #[must_use]
    pub const fn commands() -> Self {
        Self {
            reliability: Reliability::Reliable,
            durability: Durability::Volatile,
            depth: 10,
        }
    }

    /// Telemetry: best-effort, keep-last 1, volatile.
    #[must_use]
    pub const fn telemetry() -> Self {
        Self {
            reliability: Reliability::BestEffort,
            durability: Durability::Volatile,
            depth: 1,
        }
    }
}

/// Trajectory-following action result codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultCode {
    Successful,
    InvalidGoal,
    InvalidJoints,
    OldHeaderTimestamp,
    PathToleranceViolated,
    GoalToleranceViolated,
}

impl ResultCode {
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Successful => 0,
            Self::InvalidGoal => -1,
            Self::InvalidJoints => -2,
            Self::OldHeaderTimestamp => -3,
            Self::PathToleranceViolated => -4,
            Self::GoalToleranceViolated => -5,
        }
    }

    #[must_use]
    pub const fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Successful),
            -1 => Some(Self::InvalidGoal),
            -2 => Some(Self::InvalidJoints),
            -3 => Some(Self::OldHeaderTimestamp),
            -4 => Some(Self::PathToleranceViolated),
            -5 => Some(Self::GoalToleranceViolated),
            _ => None,
        }
    }

    /// Codes reported before the controller starts moving.
    #[must_use]
    pub const fn before_motion(self) -> bool {
        matches!(
            self,
            Self::InvalidGoal | Self::InvalidJoints | Self::OldHeaderTimestamp
        )
    }
}

/// Handle for an accepted goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GoalHandle {
    pub goal_id: u64,
}

/// Result message for a finished goal.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionResult {
    pub error_code: i32,
    pub error_string: String,
    /// Positions reported at completion, in goal joint order.
    pub actual_positions: Option<Vec<f64>>,
}

/// High-rate state sample, published best-effort.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    pub joint_names: Vec<String>,
    pub positions: Vec<f64>,
    pub error_code: i32,
    pub wall_duration_ms: u64,
}

/// Transport-level failure from the action channel.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    /// The server refused the goal.
    #[error("goal rejected (code {code}): {detail}")]
    Rejected { code: i32, detail: String },
    /// No result within the bound.
    #[error("no result within {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },
    /// The channel dropped.
    #[error("channel disconnected: {detail}")]
    Disconnected { detail: String },
    /// The goal was cancelled before completion.
    #[error("goal cancelled")]
    Cancelled,
}

/// Client side of the trajectory-following action.
///
/// `await_result` must return within `timeout`; it returns
/// [`ActionError::Cancelled`] once `cancel_goal` has taken effect.
pub trait TrajectoryActionClient: Send + Sync {
    /// # Errors
    ///
    /// [`ActionError::Rejected`] or [`ActionError::Disconnected`] if the goal
    /// was not accepted.
    fn send_goal(&self, goal: &TrajectoryGoalV1, qos: &QosProfile) -> Result<GoalHandle, ActionError>;

    /// # Errors
    ///
    /// Any [`ActionError`] other than `Rejected`.
    fn await_result(&self, handle: &GoalHandle, timeout: Duration) -> Result<ActionResult, ActionError>;

    /// # Errors
    ///
    /// [`ActionError::Disconnected`] if the cancel request could not be sent.
    fn cancel_goal(&self, handle: &GoalHandle) -> Result<(), ActionError>;

    /// # Errors
    ///
    /// Any transport failure; callers ignore it.
    fn publish_telemetry(&self, sample: &TelemetrySample, qos: &QosProfile) -> Result<(), ActionError>;
}

/// Result of one hardware dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum HardwareOutcome {
    Completed {
        final_state: RobotStateSnapshot,
        logical_duration_ns: u64,
        wall_duration_ms: u64,
    },
    Failed {
        failure: ExecutionFailure,
        wall_duration_ms: u64,
    },
}

pub struct HardwareBackend {
    client: Arc<dyn TrajectoryActionClient>,
    timeout: Duration,
    /// Accepted goals still awaiting a result, by goal id.
    in_flight: Mutex<BTreeMap<u64, GoalHandle>>,
}

impl std::fmt::Debug for HardwareBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HardwareBackend")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Final snapshot after a successful goal.
///
/// Reported positions, when present, must cover every goal joint with a
/// finite value; otherwise the planned final waypoint is assumed.
fn reached_state(
    goal: &TrajectoryGoalV1,
    chunk: &JointTrajectoryChunk,
    state: &RobotStateSnapshot,
    result: &ActionResult,
) -> Result<RobotStateSnapshot, String> {
    let reached: &[f64] = match &result.actual_positions {
        Some(p) => p,
        None => chunk.final_waypoint().unwrap_or_default(),
    };
    if reached.len() != goal.joint_names.len() {
        return Err(format!(
            "reported {} positions for {} goal joints",
            reached.len(),
            goal.joint_names.len()
        ));
    }
    let mut positions = state.joint_positions().to_vec();
    for (name, &p) in goal.joint_names.iter().zip(reached) {
        let i = state
            .joint_names()
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| format!("goal joint `{name}` is not in the current state"))?;
        positions[i] = p;
    }
    state
        .advanced_to(positions, state.captured_at().saturating_add(chunk.duration_nanos()))
        .map_err(|e| format!("reported final state is invalid: {e}"))
}

impl HardwareBackend {
    #[must_use]
    pub fn new(client: Arc<dyn TrajectoryActionClient>, timeout: Duration) -> Self {
        Self {
            client,
            timeout,
            in_flight: Mutex::new(BTreeMap::new()),
        }
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Cancel every goal currently in flight. Returns whether there were any.
    ///
    /// # Errors
    ///
    /// Propagates the first cancel failure; the remaining goals are still
    /// asked to cancel.
    pub fn cancel_in_flight(&self) -> Result<bool, ActionError> {
        let handles: Vec<GoalHandle> = self.lock_in_flight().values().copied().collect();
        let mut first_error = None;
        for h in &handles {
            info!(goal_id = h.goal_id, "cancelling in-flight goal");
            if let Err(e) = self.client.cancel_goal(h) {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(!handles.is_empty()),
        }
    }

    /// Number of accepted goals still awaiting a result.
    #[must_use]
    pub fn in_flight_count(&self) -> usize {
        self.lock_in_flight().len()
    }

    fn lock_in_flight(&self) -> std::sync::MutexGuard<'_, BTreeMap<u64, GoalHandle>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Send `chunk` as one goal and wait (bounded) for its result.
    ///
    /// Every joint of `chunk` must be in `state`; the adapter checks this
    /// before calling. Once a goal has been offered nothing is an error:
    /// channel failures and unusable reported states are
    /// [`HardwareOutcome::Failed`].
    pub fn dispatch(&self, chunk: &JointTrajectoryChunk, state: &RobotStateSnapshot) -> HardwareOutcome {
        let goal = TrajectoryGoalV1::from_chunk(chunk);
        let start = Instant::now();

        let handle = match self.client.send_goal(&goal, &QosProfile::commands()) {
            Ok(h) => h,
            Err(e) => {
                let failure = match e {
                    ActionError::Rejected { code, detail } => {
                        ExecutionFailure::new(FailureKind::GoalRejected, MotionApplied::NotApplied, detail)
                            .with_error_code(code)
                    }
                    other => ExecutionFailure::new(
                        FailureKind::ChannelDisconnected,
                        MotionApplied::NotApplied,
                        other.to_string(),
                    ),
                };
                warn!(failure = %failure, "goal not accepted");
                return HardwareOutcome::Failed {
                    failure,
                    wall_duration_ms: elapsed_ms(start),
                };
            }
        };
        debug!(goal_id = handle.goal_id, waypoints = goal.waypoints.len(), "goal accepted");
        self.lock_in_flight().insert(handle.goal_id, handle);
        let awaited = self.client.await_result(&handle, self.timeout);
        self.lock_in_flight().remove(&handle.goal_id);
        let wall_duration_ms = elapsed_ms(start);

        let result = match awaited {
            Ok(r) => r,
            Err(e) => {
                let failure = self.failure_after_accept(&handle, e);
                warn!(goal_id = handle.goal_id, failure = %failure, "goal did not complete");
                return HardwareOutcome::Failed {
                    failure,
                    wall_duration_ms,
                };
            }
        };

        if result.error_code != ResultCode::Successful.code() {
            let (kind, motion) = match ResultCode::from_code(result.error_code) {
                Some(code) if code.before_motion() => (FailureKind::GoalRejected, MotionApplied::NotApplied),
                Some(_) => (FailureKind::GoalAborted, MotionApplied::Partial),
                None => (FailureKind::GoalAborted, MotionApplied::Unknown),
            };
            let failure =
                ExecutionFailure::new(kind, motion, result.error_string.clone()).with_error_code(result.error_code);
            warn!(goal_id = handle.goal_id, failure = %failure, "goal failed");
            self.publish(&goal, state, &result, wall_duration_ms);
            return HardwareOutcome::Failed {
                failure,
                wall_duration_ms,
            };
        }

        self.publish(&goal, state, &result, wall_duration_ms);
        match reached_state(&goal, chunk, state, &result) {
            Ok(final_state) => {
                info!(goal_id = handle.goal_id, wall_duration_ms, "goal succeeded");
                HardwareOutcome::Completed {
                    final_state,
                    logical_duration_ns: chunk.duration_nanos(),
                    wall_duration_ms,
                }
            }
            Err(detail) => {
                let failure = ExecutionFailure::new(FailureKind::InvalidFeedback, MotionApplied::Unknown, detail);
                warn!(goal_id = handle.goal_id, failure = %failure, "goal reported unusable final state");
                HardwareOutcome::Failed {
                    failure,
                    wall_duration_ms,
                }
            }
        }
    }

    fn failure_after_accept(&self, handle: &GoalHandle, error: ActionError) -> ExecutionFailure {
        match error {
            ActionError::Timeout { timeout_ms } => {
                if let Err(e) = self.client.cancel_goal(handle) {
                    warn!(goal_id = handle.goal_id, error = %e, "cancel after timeout failed");
                }
                ExecutionFailure::new(
                    FailureKind::ExecutionTimeout,
                    MotionApplied::Partial,
                    format!("no result within {timeout_ms} ms; goal cancelled"),
                )
            }
            ActionError::Cancelled => {
                ExecutionFailure::new(FailureKind::Cancelled, MotionApplied::Partial, "goal cancelled on request")
            }
            ActionError::Disconnected { detail } => {
                ExecutionFailure::new(FailureKind::ChannelDisconnected, MotionApplied::Unknown, detail)
            }
            ActionError::Rejected { code, detail } => {
                ExecutionFailure::new(FailureKind::GoalRejected, MotionApplied::Unknown, detail).with_error_code(code)
            }
        }
    }

    fn publish(&self, goal: &TrajectoryGoalV1, state: &RobotStateSnapshot, result: &ActionResult, wall_duration_ms: u64) {
        let positions = result.actual_positions.clone().unwrap_or_else(|| {
            goal.joint_names
                .iter()
                .map(|n| state.position_of(n).unwrap_or(0.0))
                .collect()
        });
        let sample = TelemetrySample {
            joint_names: goal.joint_names.clone(),
            positions,
            error_code: result.error_code,
            wall_duration_ms,
        };
        if let Err(e) = self.client.publish_telemetry(&sample, &QosProfile::telemetry()) {
            debug!(error = %e, "telemetry dropped");
        }
    }
}
