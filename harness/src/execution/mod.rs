//! Execution adapter: one contract, two backends, idempotent replay.
//!
//! [`ExecutionAdapter::execute`] consults the [`IdempotencyCache`] before
//! touching a backend. A hit returns the stored result with outcome
//! `cached` and never re-dispatches; re-running an already-applied motion
//! on hardware is unsafe.
//!
//! # Retry policy after a failed dispatch
//!
//! | failure                                  | stored | retry under same ids        |
//! |------------------------------------------|--------|-----------------------------|
//! | goal never accepted (`NotApplied`)       | no     | dispatches again            |
//! | timeout, abort, cancel (`Partial`)       | yes    | returns the failure, cached |
//! | disconnect after accept (`Unknown`)      | yes    | returns the failure, cached |
//! | success with unusable state (`Unknown`)  | yes    | returns the failure, cached |
//!
//! Malformed input is an error only before a goal is offered; after that
//! every outcome is a stored or discarded result, never an `Err`.
//!
//! A stored failure can only be cleared by planning against a fresh
//! snapshot, which yields a new chunk id.

pub mod hardware;
pub mod simulator;

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use mrcp_kernel::contracts::chunk::JointTrajectoryChunk;
use mrcp_kernel::contracts::execution::ExecutionResult;
use mrcp_kernel::contracts::ids::{ChunkId, PlanId};
use mrcp_kernel::contracts::snapshot::RobotStateSnapshot;
use mrcp_kernel::contracts::ContractError;
use mrcp_kernel::runtime::canon::EncodingError;
use mrcp_kernel::runtime::clock::ClockError;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use self::hardware::{ActionError, HardwareBackend, HardwareOutcome};
use self::simulator::KinematicSimulator;
use crate::cache::{CacheKey, IdempotencyCache};
use crate::memo::{BuildOutcome, MemoError, Retain};
use crate::persist::{ExecutionJournal, JournalError};

/// Failure to produce an execution result at all.
///
/// Recoverable channel failures are not errors; they are results with
/// outcome `failed`.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("invalid execution input: {0}")]
    Contract(#[from] ContractError),
    #[error(transparent)]
    Encoding(#[from] EncodingError),
    #[error(transparent)]
    Clock(#[from] ClockError),
    #[error("chunk joint `{joint}` is not in the current state")]
    JointNotInState { joint: String },
    #[error("execution refused for {key}: {reason}")]
    Poisoned { key: CacheKey, reason: String },
    #[error(transparent)]
    Journal(#[from] JournalError),
    #[error(transparent)]
    Action(#[from] ActionError),
}

/// Which backend an adapter was built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    #[default]
    Simulated,
    Hardware,
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Simulated => "simulated",
            Self::Hardware => "hardware",
        })
    }
}

/// The two interchangeable backends.
#[derive(Debug)]
pub enum ExecutionBackend {
    Simulated(KinematicSimulator),
    Hardware(HardwareBackend),
}

impl ExecutionBackend {
    #[must_use]
    pub fn mode(&self) -> ExecutionMode {
        match self {
            Self::Simulated(_) => ExecutionMode::Simulated,
            Self::Hardware(_) => ExecutionMode::Hardware,
        }
    }
}

#[derive(Debug)]
pub struct ExecutionAdapter {
    backend: ExecutionBackend,
    cache: IdempotencyCache,
    journal: Option<ExecutionJournal>,
    dispatches: AtomicU64,
}

impl ExecutionAdapter {
    /// An adapter with an in-memory cache only.
    #[must_use]
    pub fn new(backend: ExecutionBackend) -> Self {
        Self {
            backend,
            cache: IdempotencyCache::new(),
            journal: None,
            dispatches: AtomicU64::new(0),
        }
    }

    /// An adapter whose cache is restored from, and persisted to, the
    /// journal at `path`. The journal is fully loaded before this returns.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Journal`] if the journal is unreadable or
    /// corrupt.
    pub fn with_journal(
        backend: ExecutionBackend,
        path: impl AsRef<Path>,
        precision: u32,
    ) -> Result<Self, AdapterError> {
        let (journal, load) = ExecutionJournal::open(path, precision)?;
        let cache = IdempotencyCache::new();
        for result in load.entries {
            cache.restore(result);
        }
        for (key, reason) in load.poisoned {
            error!(key = %key, reason = %reason, "identifier poisoned by journal");
            cache.poison(key, reason);
        }
        Ok(Self {
            backend,
            cache,
            journal: Some(journal),
            dispatches: AtomicU64::new(0),
        })
    }

    #[must_use]
    pub fn mode(&self) -> ExecutionMode {
        self.backend.mode()
    }

    #[must_use]
    pub fn cache(&self) -> &IdempotencyCache {
        &self.cache
    }

    /// Number of times a backend was actually invoked.
    #[must_use]
    pub fn backend_invocations(&self) -> u64 {
        self.dispatches.load(Ordering::SeqCst)
    }

    /// The stored result for a key, marked `cached`.
    #[must_use]
    pub fn cached(&self, plan_id: &PlanId, chunk_id: &ChunkId) -> Option<ExecutionResult> {
        self.cache
            .lookup(&CacheKey::new(plan_id.clone(), chunk_id.clone()))
            .map(|r| r.as_cached())
    }

    /// Cancel the hardware goal in flight. Always `false` in simulation.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Action`] if the cancel request fails.
    pub fn cancel_in_flight(&self) -> Result<bool, AdapterError> {
        match &self.backend {
            ExecutionBackend::Simulated(_) => Ok(false),
            ExecutionBackend::Hardware(hw) => Ok(hw.cancel_in_flight()?),
        }
    }

    /// Execute a certified chunk once per (plan, chunk).
    ///
    /// The caller is responsible for verification; the adapter only
    /// executes. Concurrent calls for one key invoke the backend once.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError`] for malformed input, a poisoned key, or a
    /// journal write failure (which also poisons the key).
    pub fn execute(
        &self,
        plan_id: &PlanId,
        chunk_id: &ChunkId,
        chunk: &JointTrajectoryChunk,
        current_state: &RobotStateSnapshot,
    ) -> Result<ExecutionResult, AdapterError> {
        let key = CacheKey::new(plan_id.clone(), chunk_id.clone());
        let outcome = self.cache.get_or_dispatch(&key, || {
            let result = self.dispatch(plan_id, chunk_id, chunk, current_state)?;
            let retain = match result.failure() {
                Some(f) if !f.may_have_moved() => Retain::Discard,
                _ => Retain::Store,
            };
            Ok::<_, AdapterError>((result, retain))
        });
        match outcome {
            Ok(BuildOutcome::Built(result)) => {
                let stored = !matches!(result.failure(), Some(f) if !f.may_have_moved());
                if stored {
                    self.persist(&key, &result)?;
                }
                info!(
                    key = %key,
                    mode = %self.mode(),
                    outcome = %result.outcome(),
                    stored,
                    "chunk dispatched"
                );
                Ok(result)
            }
            Ok(BuildOutcome::Cached(result)) => {
                debug!(key = %key, "idempotency cache hit");
                Ok(result.as_cached())
            }
            Err(MemoError::Builder(e)) => Err(e),
            Err(MemoError::Poisoned { reason }) => Err(AdapterError::Poisoned { key, reason }),
        }
    }

    fn persist(&self, key: &CacheKey, result: &ExecutionResult) -> Result<(), AdapterError> {
        let Some(journal) = &self.journal else {
            return Ok(());
        };
        if let Err(e) = journal.append(result) {
            let reason = format!("journal append failed: {e}");
            error!(key = %key, reason = %reason, "poisoning identifier");
            self.cache.poison(key.clone(), reason);
            return Err(e.into());
        }
        Ok(())
    }

    fn dispatch(
        &self,
        plan_id: &PlanId,
        chunk_id: &ChunkId,
        chunk: &JointTrajectoryChunk,
        current_state: &RobotStateSnapshot,
    ) -> Result<ExecutionResult, AdapterError> {
        chunk.validate()?;
        current_state.validate()?;
        if let Some(joint) = chunk
            .joint_names()
            .iter()
            .find(|name| current_state.position_of(name).is_none())
        {
            return Err(AdapterError::JointNotInState { joint: joint.clone() });
        }
        self.dispatches.fetch_add(1, Ordering::SeqCst);
        match &self.backend {
            ExecutionBackend::Simulated(sim) => {
                let run = sim.simulate(chunk, current_state)?;
                Ok(ExecutionResult::executed(
                    plan_id.clone(),
                    chunk_id.clone(),
                    run.final_state,
                    run.logical_duration_ns,
                    0,
                ))
            }
            ExecutionBackend::Hardware(hw) => match hw.dispatch(chunk, current_state) {
                HardwareOutcome::Completed {
                    final_state,
                    logical_duration_ns,
                    wall_duration_ms,
                } => Ok(ExecutionResult::executed(
                    plan_id.clone(),
                    chunk_id.clone(),
                    final_state,
                    logical_duration_ns,
                    wall_duration_ms,
                )),
                HardwareOutcome::Failed {
                    failure,
                    wall_duration_ms,
                } => Ok(ExecutionResult::failed(
                    plan_id.clone(),
                    chunk_id.clone(),
                    current_state.clone(),
                    failure,
                    wall_duration_ms,
                )),
            },
        }
    }
}
