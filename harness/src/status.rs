//! Read-only robot status: latest safety metrics and execution history.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, PoisonError};

use mrcp_kernel::contracts::execution::{ExecutionOutcome, ExecutionResult};
use mrcp_kernel::contracts::ids::{ChunkId, PlanId};
use mrcp_kernel::contracts::report::SafetyMetrics;
use mrcp_kernel::runtime::canon::{CanonicalForm, EncodingError};
use serde::{Deserialize, Serialize};

/// Default number of history entries kept per robot.
pub const DEFAULT_HISTORY_LIMIT: usize = 256;

/// One line of execution history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub plan_id: PlanId,
    pub chunk_id: ChunkId,
    pub outcome: ExecutionOutcome,
    pub reason: Option<String>,
    pub logical_duration_ns: u64,
}

impl HistoryEntry {
    #[must_use]
    pub fn of(result: &ExecutionResult) -> Self {
        Self {
            plan_id: result.plan_id().clone(),
            chunk_id: result.chunk_id().clone(),
            outcome: result.outcome(),
            reason: result.reason_text(),
            logical_duration_ns: result.logical_duration_ns(),
        }
    }
}

/// Status view for one robot, oldest history entry first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotStatus {
    pub robot_id: String,
    /// Metrics of the most recent verification.
    pub latest_metrics: Option<SafetyMetrics>,
    /// Every result recorded, including ones evicted from `history`.
    pub total_recorded: u64,
    pub history: Vec<HistoryEntry>,
}

impl CanonicalForm for RobotStatus {
    fn ensure_finite(&self) -> Result<(), EncodingError> {
        match &self.latest_metrics {
            Some(m) => m.ensure_finite(),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Default)]
struct Entry {
    latest_metrics: Option<SafetyMetrics>,
    total_recorded: u64,
    history: VecDeque<HistoryEntry>,
}

/// Per-robot status, bounded history.
#[derive(Debug)]
pub struct StatusBoard {
    history_limit: usize,
    robots: Mutex<BTreeMap<String, Entry>>,
}

impl StatusBoard {
    #[must_use]
    pub fn new(history_limit: usize) -> Self {
        Self {
            history_limit: history_limit.max(1),
            robots: Mutex::new(BTreeMap::new()),
        }
    }

    /// Make `robot_id` known with an empty history.
    pub fn register(&self, robot_id: &str) {
        self.robots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(robot_id.to_string())
            .or_default();
    }

    /// Append a result; `metrics` replaces the latest metrics when present.
    pub fn record(&self, robot_id: &str, result: &ExecutionResult, metrics: Option<&SafetyMetrics>) {
        let mut robots = self.robots.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = robots.entry(robot_id.to_string()).or_default();
        if let Some(m) = metrics {
            entry.latest_metrics = Some(m.clone());
        }
        entry.total_recorded = entry.total_recorded.saturating_add(1);
        entry.history.push_back(HistoryEntry::of(result));
        while entry.history.len() > self.history_limit {
            entry.history.pop_front();
        }
    }

    #[must_use]
    pub fn status(&self, robot_id: &str) -> Option<RobotStatus> {
        let robots = self.robots.lock().unwrap_or_else(PoisonError::into_inner);
        robots.get(robot_id).map(|e| RobotStatus {
            robot_id: robot_id.to_string(),
            latest_metrics: e.latest_metrics.clone(),
            total_recorded: e.total_recorded,
            history: e.history.iter().cloned().collect(),
        })
    }
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}
