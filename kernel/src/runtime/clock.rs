//! Logical clock: frozen during planning, explicitly stepped during simulated
//! execution. Never consults wall-clock time.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// A point on the logical time line, in integer nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogicalTime(u64);

impl LogicalTime {
    pub const ZERO: Self = Self(0);

    #[must_use]
    pub const fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    #[must_use]
    pub const fn as_nanos(self) -> u64 {
        self.0
    }

    /// Saturating advance by `delta` nanoseconds.
    #[must_use]
    pub const fn saturating_add(self, delta: u64) -> Self {
        Self(self.0.saturating_add(delta))
    }

    /// Nanoseconds elapsed from `earlier` to `self` (zero if `earlier` is later).
    #[must_use]
    pub const fn saturating_since(self, earlier: Self) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

impl std::fmt::Display for LogicalTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}ns", self.0)
    }
}

/// Clock mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClockMode {
    /// Planning: `now()` is constant and `step()` is refused.
    Frozen,
    /// Simulated execution: `now()` advances only through `step()`.
    Stepped,
}

/// Error from a clock operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClockError {
    /// `step()` was called while the clock is frozen.
    #[error("logical clock is frozen at {at}; step({delta_nanos}ns) refused")]
    Frozen { at: LogicalTime, delta_nanos: u64 },
}

#[derive(Debug)]
struct ClockState {
    now: LogicalTime,
    mode: ClockMode,
}

/// Steppable logical clock shared across components.
#[derive(Debug)]
pub struct LogicalClock {
    state: Mutex<ClockState>,
}

impl LogicalClock {
    #[must_use]
    pub fn new(start: LogicalTime, mode: ClockMode) -> Self {
        Self {
            state: Mutex::new(ClockState { now: start, mode }),
        }
    }

    /// Current logical time.
    #[must_use]
    pub fn now(&self) -> LogicalTime {
        self.lock().now
    }

    #[must_use]
    pub fn mode(&self) -> ClockMode {
        self.lock().mode
    }

    /// Switch between planning (frozen) and simulated execution (stepped).
    /// The current time is preserved.
    pub fn set_mode(&self, mode: ClockMode) {
        self.lock().mode = mode;
    }

    /// Advance the clock by `delta_nanos`, returning the new time.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::Frozen`] in [`ClockMode::Frozen`].
    pub fn step(&self, delta_nanos: u64) -> Result<LogicalTime, ClockError> {
        let mut state = self.lock();
        match state.mode {
            ClockMode::Frozen => Err(ClockError::Frozen {
                at: state.now,
                delta_nanos,
            }),
            ClockMode::Stepped => {
                state.now = state.now.saturating_add(delta_nanos);
                Ok(state.now)
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ClockState> {
        // The state is two plain values; a panic while holding the lock
        // cannot leave it half-updated.
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
