//! Scripted trajectory action client.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::Duration;

use mrcp_harness::execution::hardware::{
    ActionError, ActionResult, GoalHandle, QosProfile, TelemetrySample, TrajectoryActionClient,
    TrajectoryGoalV1,
};

/// What the controller does with the next goal.
#[derive(Debug, Clone, PartialEq)]
pub enum Scripted {
    /// Accept and finish with code 0.
    Succeed,
    /// Refuse the goal at send time.
    RejectOnSend { code: i32 },
    /// Accept, then finish with a nonzero result code.
    Finish { code: i32 },
    /// Accept, then never answer within the bound.
    Timeout,
    /// Accept, then lose the channel.
    Disconnect,
    /// Accept, then block until cancelled (or time out).
    Hang,
    /// Accept and finish with code 0, reporting these final positions.
    Report { positions: Vec<f64> },
}

struct Pending {
    step: Scripted,
    cancelled: bool,
}

/// Plays back [`Scripted`] steps, one per goal; succeeds once the script
/// is exhausted.
#[derive(Default)]
pub struct FakeActionClient {
    script: Mutex<VecDeque<Scripted>>,
    /// Accepted goals by id, until their result is awaited.
    pending: Mutex<BTreeMap<u64, Pending>>,
    cancel_signal: Condvar,
    awaiting: Mutex<u64>,
    awaiting_signal: Condvar,
    goals: AtomicU64,
    cancels: AtomicU64,
    telemetry: AtomicU64,
    last_goal: Mutex<Option<TrajectoryGoalV1>>,
}

impl FakeActionClient {
    #[must_use]
    pub fn new(script: impl IntoIterator<Item = Scripted>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Goals offered to the controller, accepted or not.
    #[must_use]
    pub fn goals_sent(&self) -> u64 {
        self.goals.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn cancels(&self) -> u64 {
        self.cancels.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn telemetry_published(&self) -> u64 {
        self.telemetry.load(Ordering::SeqCst)
    }

    /// Block until `n` results have been awaited in total, or `timeout`
    /// passes. Returns whether the count was reached.
    ///
    /// A goal being awaited has already been recorded as in flight by the
    /// backend, so it can be cancelled.
    #[must_use]
    pub fn wait_until_awaiting(&self, n: u64, timeout: Duration) -> bool {
        let count = self.awaiting.lock().unwrap_or_else(PoisonError::into_inner);
        let (count, _) = self
            .awaiting_signal
            .wait_timeout_while(count, timeout, |c| *c < n)
            .unwrap_or_else(PoisonError::into_inner);
        *count >= n
    }

    #[must_use]
    pub fn last_goal(&self) -> Option<TrajectoryGoalV1> {
        self.last_goal.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl TrajectoryActionClient for FakeActionClient {
    fn send_goal(&self, goal: &TrajectoryGoalV1, _qos: &QosProfile) -> Result<GoalHandle, ActionError> {
        let goal_id = self.goals.fetch_add(1, Ordering::SeqCst) + 1;
        *self.last_goal.lock().unwrap_or_else(PoisonError::into_inner) = Some(goal.clone());
        let step = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or(Scripted::Succeed);
        if let Scripted::RejectOnSend { code } = step {
            return Err(ActionError::Rejected {
                code,
                detail: "controller refused goal".into(),
            });
        }
        self.pending.lock().unwrap_or_else(PoisonError::into_inner).insert(
            goal_id,
            Pending {
                step,
                cancelled: false,
            },
        );
        Ok(GoalHandle { goal_id })
    }

    fn await_result(&self, handle: &GoalHandle, timeout: Duration) -> Result<ActionResult, ActionError> {
        let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        *self.awaiting.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        self.awaiting_signal.notify_all();
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        let step = pending.get(&handle.goal_id).map_or(Scripted::Succeed, |p| p.step.clone());
        let result = match step {
            Scripted::Succeed | Scripted::RejectOnSend { .. } => Ok(ActionResult {
                error_code: 0,
                error_string: String::new(),
                actual_positions: None,
            }),
            Scripted::Report { positions } => Ok(ActionResult {
                error_code: 0,
                error_string: String::new(),
                actual_positions: Some(positions),
            }),
            Scripted::Finish { code } => Ok(ActionResult {
                error_code: code,
                error_string: format!("controller reported {code}"),
                actual_positions: None,
            }),
            Scripted::Timeout => Err(ActionError::Timeout { timeout_ms }),
            Scripted::Disconnect => Err(ActionError::Disconnected {
                detail: "controller went away".into(),
            }),
            Scripted::Hang => {
                let (mut pending, waited) = self
                    .cancel_signal
                    .wait_timeout_while(pending, timeout, |m| {
                        !m.get(&handle.goal_id).is_some_and(|p| p.cancelled)
                    })
                    .unwrap_or_else(PoisonError::into_inner);
                pending.remove(&handle.goal_id);
                return if waited.timed_out() {
                    Err(ActionError::Timeout { timeout_ms })
                } else {
                    Err(ActionError::Cancelled)
                };
            }
        };
        pending.remove(&handle.goal_id);
        result
    }

    fn cancel_goal(&self, handle: &GoalHandle) -> Result<(), ActionError> {
        self.cancels.fetch_add(1, Ordering::SeqCst);
        if let Some(p) = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(&handle.goal_id)
        {
            p.cancelled = true;
        }
        self.cancel_signal.notify_all();
        Ok(())
    }

    fn publish_telemetry(&self, _sample: &TelemetrySample, _qos: &QosProfile) -> Result<(), ActionError> {
        self.telemetry.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
