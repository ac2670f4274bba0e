//! Idempotency cache: the one canonical execution result per (plan, chunk).

use mrcp_kernel::contracts::execution::ExecutionResult;
use mrcp_kernel::contracts::ids::{ChunkId, PlanId};
use serde::{Deserialize, Serialize};

use crate::memo::{BuildOutcome, BuildTable, MemoError, Retain};

/// Cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey {
    pub plan_id: PlanId,
    pub chunk_id: ChunkId,
}

impl CacheKey {
    #[must_use]
    pub fn new(plan_id: PlanId, chunk_id: ChunkId) -> Self {
        Self { plan_id, chunk_id }
    }

    /// The key a stored result belongs under.
    #[must_use]
    pub fn of(result: &ExecutionResult) -> Self {
        Self::new(result.plan_id().clone(), result.chunk_id().clone())
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.plan_id.short(), self.chunk_id.short())
    }
}

/// Exclusive owner of stored execution results. Callers get clones.
///
/// Backed by [`BuildTable`], so a dispatch for a key runs at most once at a
/// time and the map lock is never held across a backend call.
#[derive(Debug, Default)]
pub struct IdempotencyCache {
    table: BuildTable<CacheKey, ExecutionResult>,
}

impl IdempotencyCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The stored result, exactly as it was stored.
    #[must_use]
    pub fn lookup(&self, key: &CacheKey) -> Option<ExecutionResult> {
        self.table.get(key)
    }

    /// Return the stored result or run `dispatch` to produce one.
    ///
    /// # Errors
    ///
    /// Propagates the dispatch error, or [`MemoError::Poisoned`].
    pub fn get_or_dispatch<E>(
        &self,
        key: &CacheKey,
        dispatch: impl FnOnce() -> Result<(ExecutionResult, Retain), E>,
    ) -> Result<BuildOutcome<ExecutionResult>, MemoError<E>> {
        self.table.get_or_build_retaining(key, dispatch)
    }

    /// Restore a result read back from the journal.
    pub fn restore(&self, result: ExecutionResult) -> bool {
        self.table.preload(CacheKey::of(&result), result)
    }

    pub fn poison(&self, key: CacheKey, reason: impl Into<String>) {
        self.table.poison(key, reason);
    }

    #[must_use]
    pub fn poison_reason(&self, key: &CacheKey) -> Option<String> {
        self.table.poison_reason(key)
    }

    /// Number of stored results.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.ready_len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
