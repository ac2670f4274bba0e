//! At-most-one-build memo table.
//!
//! [`BuildTable`] runs a builder at most once per key at a time. Concurrent
//! callers for a key that is being built block on a condition variable and
//! receive the winner's value. The map lock is never held while a builder
//! runs.
//!
//! # Slot lifecycle
//!
//! ```text
//! (absent) --claim--> InFlight --Ok + Store--> Ready(v)
//!                        |  \--Ok + Discard / Err / panic--> (absent)
//!                        \--poison--> Poisoned(reason)
//! ```
//!
//! A builder failure leaves no trace: the next caller rebuilds. Only
//! [`BuildTable::poison`] makes a key permanently unusable.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

enum Slot<V> {
    InFlight,
    Ready(V),
    Poisoned(String),
}

/// Whether a built value is kept for later callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retain {
    Store,
    /// Hand the value to this caller only; the next caller rebuilds.
    Discard,
}

/// Value returned by a successful lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum BuildOutcome<V> {
    /// This caller ran the builder.
    Built(V),
    /// Another caller built it (earlier, or while this caller waited).
    Cached(V),
}

impl<V> BuildOutcome<V> {
    #[must_use]
    pub fn into_value(self) -> V {
        match self {
            Self::Built(v) | Self::Cached(v) => v,
        }
    }

    #[must_use]
    pub fn was_built(&self) -> bool {
        matches!(self, Self::Built(_))
    }
}

/// Non-blocking lookup result.
#[derive(Debug, Clone, PartialEq)]
pub enum TryBuild<V> {
    Done(BuildOutcome<V>),
    /// Another caller is building this key right now.
    InProgress,
}

/// Failure from a memo lookup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MemoError<E> {
    /// The builder returned an error. The key stays buildable.
    #[error("builder failed: {0}")]
    Builder(E),
    /// The key was marked fatally failed.
    #[error("identifier poisoned: {reason}")]
    Poisoned { reason: String },
}

/// Map from key to built value with per-key exclusive build.
pub struct BuildTable<K, V> {
    slots: Mutex<HashMap<K, Slot<V>>>,
    changed: Condvar,
}

impl<K, V> std::fmt::Debug for BuildTable<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildTable").finish_non_exhaustive()
    }
}

impl<K, V> Default for BuildTable<K, V> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            changed: Condvar::new(),
        }
    }
}

/// Releases an in-flight slot if the builder unwinds.
struct InFlightGuard<'a, K: Eq + Hash, V> {
    table: &'a BuildTable<K, V>,
    key: &'a K,
    armed: bool,
}

impl<K: Eq + Hash, V> Drop for InFlightGuard<'_, K, V> {
    fn drop(&mut self) {
        if self.armed {
            let mut slots = self.table.lock();
            if matches!(slots.get(self.key), Some(Slot::InFlight)) {
                slots.remove(self.key);
            }
            drop(slots);
            self.table.changed.notify_all();
        }
    }
}

enum Claim<V> {
    Claimed,
    Found(V),
    Busy,
}

impl<K, V> BuildTable<K, V> {
    fn lock(&self) -> MutexGuard<'_, HashMap<K, Slot<V>>> {
        // Slots are only ever replaced whole, so a poisoned lock still
        // guards a consistent map.
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<K: Eq + Hash + Clone, V: Clone> BuildTable<K, V> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build `key` once; concurrent callers wait for the first builder.
    ///
    /// # Errors
    ///
    /// [`MemoError::Builder`] if this caller's builder failed;
    /// [`MemoError::Poisoned`] if the key is poisoned.
    pub fn get_or_build<E>(
        &self,
        key: &K,
        build: impl FnOnce() -> Result<V, E>,
    ) -> Result<BuildOutcome<V>, MemoError<E>> {
        self.get_or_build_retaining(key, || build().map(|v| (v, Retain::Store)))
    }

    /// Like [`BuildTable::get_or_build`], but the builder decides whether
    /// its value is kept. A discarded value wakes waiters, and one of them
    /// builds again.
    ///
    /// # Errors
    ///
    /// See [`BuildTable::get_or_build`].
    pub fn get_or_build_retaining<E>(
        &self,
        key: &K,
        build: impl FnOnce() -> Result<(V, Retain), E>,
    ) -> Result<BuildOutcome<V>, MemoError<E>> {
        match self.claim(key, true)? {
            Claim::Found(v) => Ok(BuildOutcome::Cached(v)),
            Claim::Claimed => self.run_builder(key, build),
            // Blocking claims never come back busy.
            Claim::Busy => Err(MemoError::Poisoned {
                reason: "in-flight slot changed while waiting".into(),
            }),
        }
    }

    /// Non-blocking variant: returns [`TryBuild::InProgress`] instead of
    /// waiting on another caller's build.
    ///
    /// # Errors
    ///
    /// See [`BuildTable::get_or_build`].
    pub fn try_get_or_build<E>(
        &self,
        key: &K,
        build: impl FnOnce() -> Result<V, E>,
    ) -> Result<TryBuild<V>, MemoError<E>> {
        match self.claim(key, false)? {
            Claim::Found(v) => Ok(TryBuild::Done(BuildOutcome::Cached(v))),
            Claim::Busy => Ok(TryBuild::InProgress),
            Claim::Claimed => self
                .run_builder(key, || build().map(|v| (v, Retain::Store)))
                .map(TryBuild::Done),
        }
    }

    fn claim<E>(&self, key: &K, wait: bool) -> Result<Claim<V>, MemoError<E>> {
        let mut slots = self.lock();
        loop {
            match slots.get(key) {
                Some(Slot::Ready(v)) => return Ok(Claim::Found(v.clone())),
                Some(Slot::Poisoned(reason)) => {
                    return Err(MemoError::Poisoned {
                        reason: reason.clone(),
                    })
                }
                Some(Slot::InFlight) if !wait => return Ok(Claim::Busy),
                Some(Slot::InFlight) => {
                    slots = self
                        .changed
                        .wait(slots)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                None => {
                    slots.insert(key.clone(), Slot::InFlight);
                    return Ok(Claim::Claimed);
                }
            }
        }
    }

    fn run_builder<E>(
        &self,
        key: &K,
        build: impl FnOnce() -> Result<(V, Retain), E>,
    ) -> Result<BuildOutcome<V>, MemoError<E>> {
        let mut guard = InFlightGuard {
            table: self,
            key,
            armed: true,
        };
        let result = build();
        guard.armed = false;

        let mut slots = self.lock();
        let outcome = match result {
            Ok((value, retain)) => match slots.get(key) {
                // Poisoned while building: the poison wins, the value is
                // still returned to the caller that built it.
                Some(Slot::Poisoned(_)) => Ok(BuildOutcome::Built(value)),
                _ => {
                    match retain {
                        Retain::Store => {
                            slots.insert(key.clone(), Slot::Ready(value.clone()));
                        }
                        Retain::Discard => {
                            slots.remove(key);
                        }
                    }
                    Ok(BuildOutcome::Built(value))
                }
            },
            Err(e) => {
                if matches!(slots.get(key), Some(Slot::InFlight)) {
                    slots.remove(key);
                }
                Err(MemoError::Builder(e))
            }
        };
        drop(slots);
        self.changed.notify_all();
        outcome
    }

    /// The stored value, if one is ready.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<V> {
        match self.lock().get(key) {
            Some(Slot::Ready(v)) => Some(v.clone()),
            _ => None,
        }
    }

    /// Store a value without building it (used when restoring from disk).
    ///
    /// Returns `false` and keeps the existing slot if the key is occupied.
    pub fn preload(&self, key: K, value: V) -> bool {
        let mut slots = self.lock();
        if slots.contains_key(&key) {
            return false;
        }
        slots.insert(key, Slot::Ready(value));
        true
    }

    /// Mark `key` as fatally failed. Every later lookup is refused.
    pub fn poison(&self, key: K, reason: impl Into<String>) {
        self.lock().insert(key, Slot::Poisoned(reason.into()));
        self.changed.notify_all();
    }

    /// The poison reason, if `key` is poisoned.
    #[must_use]
    pub fn poison_reason(&self, key: &K) -> Option<String> {
        match self.lock().get(key) {
            Some(Slot::Poisoned(reason)) => Some(reason.clone()),
            _ => None,
        }
    }

    /// Drop every ready value whose key matches `evict`; returns how many
    /// went. In-flight and poisoned slots are kept.
    pub fn evict_ready_where(&self, mut evict: impl FnMut(&K) -> bool) -> usize {
        let mut slots = self.lock();
        let before = slots.len();
        slots.retain(|k, slot| !(matches!(slot, Slot::Ready(_)) && evict(k)));
        before - slots.len()
    }

    /// Number of ready values.
    #[must_use]
    pub fn ready_len(&self) -> usize {
        self.lock()
            .values()
            .filter(|s| matches!(s, Slot::Ready(_)))
            .count()
    }
}
