//! Pipeline orchestrator: stable identifiers, at-most-one build per id,
//! and the verify-then-execute gate.
//!
//! # Identifiers
//!
//! ```text
//! plan_id  = hash(PlanId,  {config_digest, instruction, perception, robot_state})
//! chunk_id = hash(ChunkId, {chunk, ordinal, plan_id})
//! ```
//!
//! The instruction is whitespace-collapsed before hashing. Snapshots enter
//! in canonical form, so a change below the rounding precision does not
//! move either id and any change above it does.
//!
//! # Sequencing
//!
//! [`PipelineOrchestrator::execute_chunk`] never reaches the adapter with
//! an uncertified chunk. Verification is memoized by (chunk id, state
//! digest) and checks the canonical form of the state, so the verdict
//! depends only on the key. Execution is memoized by (plan id, chunk id)
//! inside the adapter.
//! A poisoned identifier is refused before either runs.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use mrcp_kernel::contracts::chunk::JointTrajectoryChunk;
use mrcp_kernel::contracts::execution::ExecutionResult;
use mrcp_kernel::contracts::ids::{ChunkId, PlanId};
use mrcp_kernel::contracts::report::SafetyReport;
use mrcp_kernel::contracts::snapshot::{PerceptionSnapshot, RobotStateSnapshot};
use mrcp_kernel::contracts::ContractError;
use mrcp_kernel::runtime::canon::{to_canonical_value, EncodingError};
use mrcp_kernel::runtime::clock::LogicalTime;
use mrcp_kernel::runtime::hash::{ContentHash, HashDomain};
use mrcp_kernel::runtime::DeterminismRuntime;
use mrcp_safety::{SafetyVerificationEngine, VerifyError};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::cache::CacheKey;
use crate::config::{FreshnessConfig, PipelineConfig};
use crate::execution::hardware::{HardwareBackend, TrajectoryActionClient};
use crate::execution::simulator::KinematicSimulator;
use crate::execution::{AdapterError, ExecutionAdapter, ExecutionBackend, ExecutionMode};
use crate::memo::{BuildTable, MemoError};
use crate::status::{RobotStatus, StatusBoard};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("invalid input: {0}")]
    Contract(#[from] ContractError),
    #[error(transparent)]
    Encoding(#[from] EncodingError),
    #[error("instruction is empty")]
    EmptyInstruction,
    #[error("{which} snapshot is stale: age {age_ns}ns exceeds bound {bound_ns}ns")]
    StaleSnapshot {
        which: &'static str,
        age_ns: u64,
        bound_ns: u64,
    },
    #[error("snapshot pair already used for instruction {previous:?}; capture fresh snapshots")]
    SnapshotReuse { previous: String },
    #[error("unknown plan {0}")]
    UnknownPlan(PlanId),
    #[error("chunk {chunk_id} is not registered under plan {plan_id}")]
    UnknownChunk { plan_id: PlanId, chunk_id: ChunkId },
    #[error("ordinal {ordinal} of plan {plan_id} is already bound to a different chunk")]
    ConflictingChunk { plan_id: PlanId, ordinal: u32 },
    #[error("chunk source failed: {detail}")]
    Source { detail: String },
    #[error(transparent)]
    Verify(#[from] VerifyError),
    #[error(transparent)]
    Execution(#[from] AdapterError),
    #[error("identifier {id} is poisoned: {reason}")]
    Poisoned { id: String, reason: String },
    #[error("unknown robot `{0}`")]
    UnknownRobot(String),
    #[error("hardware mode needs an action client")]
    MissingActionClient,
}

/// What a [`ChunkSource`] is asked to plan.
#[derive(Debug, Clone, Copy)]
pub struct PlanRequest<'a> {
    pub plan_id: &'a PlanId,
    /// Whitespace-collapsed instruction.
    pub instruction: &'a str,
    pub perception: &'a PerceptionSnapshot,
    pub robot_state: &'a RobotStateSnapshot,
}

/// The planning tiers upstream of verification (decomposition, planning,
/// encoding, mapping). Called at most once per plan id.
pub trait ChunkSource: Send + Sync {
    /// Candidate chunks in execution order.
    ///
    /// # Errors
    ///
    /// A human-readable reason the request could not be planned.
    fn propose(&self, request: &PlanRequest<'_>) -> Result<Vec<JointTrajectoryChunk>, String>;
}

/// Result of [`PipelineOrchestrator::plan_with`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanSummary {
    pub plan_id: PlanId,
    /// In the order the source yielded them.
    pub chunk_ids: Vec<ChunkId>,
}

#[derive(Debug)]
struct PlanRecord {
    instruction: String,
    ordinals: BTreeMap<u32, ChunkId>,
}

#[derive(Debug)]
struct RegisteredChunk {
    plan_id: PlanId,
    chunk: JointTrajectoryChunk,
}

#[derive(Debug)]
struct SnapshotOwner {
    instruction: String,
    /// Earlier capture time of the pair.
    oldest_capture: LogicalTime,
}

#[derive(Debug, Default)]
struct Session {
    plans: BTreeMap<PlanId, PlanRecord>,
    chunks: BTreeMap<ChunkId, RegisteredChunk>,
    /// Snapshot-pair digest to the instruction that first used it. Only
    /// kept while reuse is rejected.
    snapshot_owners: BTreeMap<ContentHash, SnapshotOwner>,
}

type ReportKey = (ChunkId, ContentHash);

#[derive(Debug)]
pub struct PipelineOrchestrator {
    runtime: Arc<DeterminismRuntime>,
    freshness: FreshnessConfig,
    engine: SafetyVerificationEngine,
    adapter: ExecutionAdapter,
    plans: BuildTable<PlanId, PlanSummary>,
    reports: BuildTable<ReportKey, SafetyReport>,
    session: Mutex<Session>,
    status: StatusBoard,
}

fn collapse_whitespace(instruction: &str) -> String {
    instruction.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl PipelineOrchestrator {
    /// Assemble an orchestrator from already-built parts.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Verify`] if the profile or thresholds in
    /// `config` are invalid.
    pub fn new(
        runtime: Arc<DeterminismRuntime>,
        config: &PipelineConfig,
        adapter: ExecutionAdapter,
    ) -> Result<Self, PipelineError> {
        let engine = SafetyVerificationEngine::new(
            config.robot.clone(),
            config.safety.clone(),
            runtime.config().float_precision,
        )?;
        let status = StatusBoard::new(config.status.history_limit);
        status.register(&config.robot.robot_id);
        info!(
            robot_id = %config.robot.robot_id,
            mode = %adapter.mode(),
            config_digest = %runtime.config_digest().short(),
            "pipeline orchestrator ready"
        );
        Ok(Self {
            runtime,
            freshness: config.freshness.clone(),
            engine,
            adapter,
            plans: BuildTable::new(),
            reports: BuildTable::new(),
            session: Mutex::new(Session::default()),
            status,
        })
    }

    /// Build the runtime, backend, and (optional) journal from `config`.
    ///
    /// The journal is fully loaded before this returns, so replays of chunks
    /// executed by an earlier process are served from the cache.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::MissingActionClient`] in hardware mode
    /// without a client, or any construction error of the parts.
    pub fn from_config(
        config: &PipelineConfig,
        client: Option<Arc<dyn TrajectoryActionClient>>,
    ) -> Result<Self, PipelineError> {
        let runtime = DeterminismRuntime::shared(config.determinism.clone())?;
        let backend = match config.execution.mode {
            ExecutionMode::Simulated => {
                ExecutionBackend::Simulated(KinematicSimulator::new(config.execution.tick_ns))
            }
            ExecutionMode::Hardware => {
                let client = client.ok_or(PipelineError::MissingActionClient)?;
                ExecutionBackend::Hardware(HardwareBackend::new(
                    client,
                    Duration::from_millis(config.execution.result_timeout_ms),
                ))
            }
        };
        let adapter = match &config.execution.journal_path {
            Some(path) => {
                ExecutionAdapter::with_journal(backend, path, config.determinism.float_precision)?
            }
            None => ExecutionAdapter::new(backend),
        };
        Self::new(runtime, config, adapter)
    }

    #[must_use]
    pub fn runtime(&self) -> &Arc<DeterminismRuntime> {
        &self.runtime
    }

    #[must_use]
    pub fn engine(&self) -> &SafetyVerificationEngine {
        &self.engine
    }

    #[must_use]
    pub fn adapter(&self) -> &ExecutionAdapter {
        &self.adapter
    }

    fn session(&self) -> std::sync::MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Freeze the inputs of a new plan and derive its id.
    ///
    /// Beginning the same plan twice returns the same id.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::EmptyInstruction`] for a blank instruction.
    /// - [`PipelineError::Contract`] or [`PipelineError::Encoding`] for a
    ///   malformed snapshot.
    /// - [`PipelineError::StaleSnapshot`] if freshness is enforced and a
    ///   snapshot is older than the bound relative to the logical clock.
    /// - [`PipelineError::SnapshotReuse`] if reuse rejection is enabled and
    ///   the snapshot pair was begun with a different instruction.
    pub fn begin_plan(
        &self,
        instruction: &str,
        perception: &PerceptionSnapshot,
        robot_state: &RobotStateSnapshot,
    ) -> Result<PlanId, PipelineError> {
        let instruction = collapse_whitespace(instruction);
        if instruction.is_empty() {
            return Err(PipelineError::EmptyInstruction);
        }
        perception.validate()?;
        robot_state.validate()?;
        if self.freshness.enforce {
            let now = self.runtime.clock().now();
            for (which, captured_at) in [
                ("perception", perception.captured_at()),
                ("robot_state", robot_state.captured_at()),
            ] {
                let age_ns = now.saturating_since(captured_at);
                if age_ns > self.freshness.max_age_ns {
                    return Err(PipelineError::StaleSnapshot {
                        which,
                        age_ns,
                        bound_ns: self.freshness.max_age_ns,
                    });
                }
            }
        }

        let oldest_capture = perception.captured_at().min(robot_state.captured_at());
        let perception = to_canonical_value(perception)?;
        let robot_state = to_canonical_value(robot_state)?;
        let pair_digest = self.runtime.hash_value(
            HashDomain::ContractValue,
            &json!({ "perception": perception, "robot_state": robot_state }),
        )?;
        let plan_id = PlanId::from_hash(self.runtime.hash_value(
            HashDomain::PlanId,
            &json!({
                "config_digest": self.runtime.config_digest().as_str(),
                "instruction": instruction,
                "perception": perception,
                "robot_state": robot_state,
            }),
        )?);

        let mut session = self.session();
        if self.freshness.reject_snapshot_reuse {
            if self.freshness.enforce {
                // A stale pair is refused before its owner is consulted.
                let now = self.runtime.clock().now();
                let max_age_ns = self.freshness.max_age_ns;
                session
                    .snapshot_owners
                    .retain(|_, owner| now.saturating_since(owner.oldest_capture) <= max_age_ns);
            }
            match session.snapshot_owners.get(&pair_digest) {
                Some(owner) if owner.instruction != instruction => {
                    return Err(PipelineError::SnapshotReuse {
                        previous: owner.instruction.clone(),
                    });
                }
                Some(_) => {}
                None => {
                    session.snapshot_owners.insert(
                        pair_digest,
                        SnapshotOwner {
                            instruction: instruction.clone(),
                            oldest_capture,
                        },
                    );
                }
            }
        }
        if !session.plans.contains_key(&plan_id) {
            info!(plan_id = %plan_id.short(), instruction = %instruction, "plan begun");
            session.plans.insert(
                plan_id.clone(),
                PlanRecord {
                    instruction,
                    ordinals: BTreeMap::new(),
                },
            );
        }
        Ok(plan_id)
    }

    /// Validate `chunk` and bind it to `plan_id` under its ordinal.
    ///
    /// Registering an identical chunk again returns the same id.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::UnknownPlan`] if `plan_id` was never begun here.
    /// - [`PipelineError::Contract`] for a malformed chunk.
    /// - [`PipelineError::ConflictingChunk`] if the ordinal already holds a
    ///   different chunk.
    pub fn register_chunk(
        &self,
        plan_id: &PlanId,
        chunk: JointTrajectoryChunk,
    ) -> Result<ChunkId, PipelineError> {
        if !self.session().plans.contains_key(plan_id) {
            return Err(PipelineError::UnknownPlan(plan_id.clone()));
        }
        chunk.validate()?;
        let ordinal = chunk.ordinal();
        let chunk_id = ChunkId::from_hash(self.runtime.hash_value(
            HashDomain::ChunkId,
            &json!({
                "chunk": to_canonical_value(&chunk)?,
                "ordinal": ordinal,
                "plan_id": plan_id.as_str(),
            }),
        )?);

        let mut session = self.session();
        let plan = session
            .plans
            .get_mut(plan_id)
            .ok_or_else(|| PipelineError::UnknownPlan(plan_id.clone()))?;
        match plan.ordinals.get(&ordinal) {
            Some(existing) if *existing == chunk_id => return Ok(chunk_id),
            Some(_) => {
                return Err(PipelineError::ConflictingChunk {
                    plan_id: plan_id.clone(),
                    ordinal,
                })
            }
            None => {
                plan.ordinals.insert(ordinal, chunk_id.clone());
            }
        }
        session.chunks.insert(
            chunk_id.clone(),
            RegisteredChunk {
                plan_id: plan_id.clone(),
                chunk,
            },
        );
        debug!(plan_id = %plan_id.short(), chunk_id = %chunk_id.short(), ordinal, "chunk registered");
        Ok(chunk_id)
    }

    /// Begin a plan and let `source` propose its chunks, once per plan id.
    ///
    /// Concurrent callers with equal inputs share one `propose` call; a
    /// source failure leaves the plan buildable by a later caller.
    ///
    /// # Errors
    ///
    /// Any [`PipelineOrchestrator::begin_plan`] or
    /// [`PipelineOrchestrator::register_chunk`] error,
    /// [`PipelineError::Source`] if the source fails or yields nothing.
    pub fn plan_with(
        &self,
        source: &dyn ChunkSource,
        instruction: &str,
        perception: &PerceptionSnapshot,
        robot_state: &RobotStateSnapshot,
    ) -> Result<PlanSummary, PipelineError> {
        let plan_id = self.begin_plan(instruction, perception, robot_state)?;
        let instruction = collapse_whitespace(instruction);
        let built = self.plans.get_or_build(&plan_id, || -> Result<PlanSummary, PipelineError> {
            let request = PlanRequest {
                plan_id: &plan_id,
                instruction: &instruction,
                perception,
                robot_state,
            };
            let chunks = source
                .propose(&request)
                .map_err(|detail| PipelineError::Source { detail })?;
            if chunks.is_empty() {
                return Err(PipelineError::Source {
                    detail: "no chunks proposed".into(),
                });
            }
            let chunk_ids = chunks
                .into_iter()
                .map(|chunk| self.register_chunk(&plan_id, chunk))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(PlanSummary {
                plan_id: plan_id.clone(),
                chunk_ids,
            })
        });
        match built {
            Ok(outcome) => Ok(outcome.into_value()),
            Err(MemoError::Builder(e)) => Err(e),
            Err(MemoError::Poisoned { reason }) => Err(PipelineError::Poisoned {
                id: plan_id.to_string(),
                reason,
            }),
        }
    }

    /// The registered chunk for an id.
    #[must_use]
    pub fn chunk(&self, chunk_id: &ChunkId) -> Option<JointTrajectoryChunk> {
        self.session().chunks.get(chunk_id).map(|r| r.chunk.clone())
    }

    /// The whitespace-collapsed instruction a plan was begun with.
    #[must_use]
    pub fn instruction(&self, plan_id: &PlanId) -> Option<String> {
        self.session()
            .plans
            .get(plan_id)
            .map(|p| p.instruction.clone())
    }

    /// Forget a finished plan: its record, its chunks, and the reports
    /// memoized for them. Returns `false` for a plan not held here.
    ///
    /// Execution results stay in the adapter, so a chunk that ran is never
    /// dispatched again even if the same plan is begun anew.
    pub fn retire_plan(&self, plan_id: &PlanId) -> bool {
        let chunk_ids: BTreeSet<ChunkId> = {
            let mut session = self.session();
            let Some(plan) = session.plans.remove(plan_id) else {
                return false;
            };
            let ids: BTreeSet<ChunkId> = plan.ordinals.into_values().collect();
            session.chunks.retain(|id, _| !ids.contains(id));
            ids
        };
        self.plans.evict_ready_where(|id| id == plan_id);
        let reports = self
            .reports
            .evict_ready_where(|(chunk_id, _)| chunk_ids.contains(chunk_id));
        info!(plan_id = %plan_id.short(), chunks = chunk_ids.len(), reports, "plan retired");
        true
    }

    /// Plans currently held.
    #[must_use]
    pub fn plan_count(&self) -> usize {
        self.session().plans.len()
    }

    #[must_use]
    pub fn memoized_reports(&self) -> usize {
        self.reports.ready_len()
    }

    /// Verify without executing. Memoized by chunk id and state digest.
    ///
    /// # Errors
    ///
    /// [`PipelineError::UnknownPlan`], [`PipelineError::UnknownChunk`], or a
    /// [`VerifyError`] for malformed input.
    pub fn verify_chunk(
        &self,
        plan_id: &PlanId,
        chunk_id: &ChunkId,
        current_state: &RobotStateSnapshot,
    ) -> Result<SafetyReport, PipelineError> {
        let chunk = self.lookup_chunk(plan_id, chunk_id)?;
        self.verify_memoized(chunk_id, &chunk, current_state)
    }

    fn lookup_chunk(
        &self,
        plan_id: &PlanId,
        chunk_id: &ChunkId,
    ) -> Result<JointTrajectoryChunk, PipelineError> {
        let session = self.session();
        if !session.plans.contains_key(plan_id) {
            return Err(PipelineError::UnknownPlan(plan_id.clone()));
        }
        match session.chunks.get(chunk_id) {
            Some(r) if r.plan_id == *plan_id => Ok(r.chunk.clone()),
            _ => Err(PipelineError::UnknownChunk {
                plan_id: plan_id.clone(),
                chunk_id: chunk_id.clone(),
            }),
        }
    }

    fn verify_memoized(
        &self,
        chunk_id: &ChunkId,
        chunk: &JointTrajectoryChunk,
        current_state: &RobotStateSnapshot,
    ) -> Result<SafetyReport, PipelineError> {
        // The check sees exactly what the key encodes.
        let canonical = current_state.rounded(self.runtime.config().float_precision)?;
        let state_digest = self.runtime.hash(HashDomain::StateDigest, &canonical)?;
        let key = (chunk_id.clone(), state_digest);
        match self
            .reports
            .get_or_build(&key, || self.engine.verify(chunk, &canonical))
        {
            Ok(outcome) => Ok(outcome.into_value()),
            Err(MemoError::Builder(e)) => Err(e.into()),
            Err(MemoError::Poisoned { reason }) => Err(PipelineError::Poisoned {
                id: chunk_id.to_string(),
                reason,
            }),
        }
    }

    /// Verify `chunk_id` against `current_state` and execute it if certified.
    ///
    /// - Poisoned (plan, chunk): refused.
    /// - Already executed: the stored result, outcome `cached`; nothing runs.
    /// - Rejected: a `rejected` result carrying the report; the adapter is
    ///   not called.
    /// - Certified: the adapter's result (`executed` or `failed`).
    ///
    /// Every returned result is appended to the robot's history.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] for unknown ids, malformed input, a
    /// poisoned id, or an adapter error.
    pub fn execute_chunk(
        &self,
        plan_id: &PlanId,
        chunk_id: &ChunkId,
        current_state: &RobotStateSnapshot,
    ) -> Result<ExecutionResult, PipelineError> {
        let chunk = self.lookup_chunk(plan_id, chunk_id)?;
        let key = CacheKey::new(plan_id.clone(), chunk_id.clone());
        if let Some(reason) = self.adapter.cache().poison_reason(&key) {
            return Err(PipelineError::Poisoned {
                id: key.to_string(),
                reason,
            });
        }
        let robot_id = self.engine.profile().robot_id.as_str();
        if let Some(cached) = self.adapter.cached(plan_id, chunk_id) {
            debug!(key = %key, "replay served from cache");
            self.status.record(robot_id, &cached, None);
            return Ok(cached);
        }

        let report = self.verify_memoized(chunk_id, &chunk, current_state)?;
        if !report.is_valid() {
            warn!(key = %key, reason = %report.reason_text(), "chunk rejected");
            let result = ExecutionResult::rejected(
                plan_id.clone(),
                chunk_id.clone(),
                current_state.clone(),
                report.clone(),
            );
            self.status.record(robot_id, &result, Some(report.metrics()));
            return Ok(result);
        }

        let result = self
            .adapter
            .execute(plan_id, chunk_id, &chunk, current_state)?;
        self.status.record(robot_id, &result, Some(report.metrics()));
        Ok(result)
    }

    /// Latest metrics and history for `robot_id`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::UnknownRobot`] for an unconfigured robot.
    pub fn robot_status(&self, robot_id: &str) -> Result<RobotStatus, PipelineError> {
        self.status
            .status(robot_id)
            .ok_or_else(|| PipelineError::UnknownRobot(robot_id.to_string()))
    }

    /// [`PipelineOrchestrator::robot_status`] as canonical JSON bytes.
    ///
    /// # Errors
    ///
    /// See [`PipelineOrchestrator::robot_status`]; also
    /// [`PipelineError::Encoding`].
    pub fn robot_status_json(&self, robot_id: &str) -> Result<Vec<u8>, PipelineError> {
        let status = self.robot_status(robot_id)?;
        Ok(self.runtime.canonicalize(&status)?)
    }
}
