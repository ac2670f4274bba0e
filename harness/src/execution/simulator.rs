//! Tick-based kinematic simulator.
//!
//! The state transition is a pure function of (current state, chunk): joints
//! follow the piecewise-linear path through the waypoints and land exactly on
//! the final waypoint once the last tick has elapsed. Time comes from a
//! private stepped [`LogicalClock`] started at the state's capture time, so no
//! wall clock is read and no real-time delay is introduced.
//!
//! The run is computed per segment, not per tick, so its cost depends only on
//! the number of waypoints however long the chunk lasts.

use mrcp_kernel::contracts::chunk::JointTrajectoryChunk;
use mrcp_kernel::contracts::snapshot::RobotStateSnapshot;
use mrcp_kernel::runtime::clock::{ClockMode, LogicalClock};

use super::AdapterError;

/// Default tick length: 10 ms.
pub const DEFAULT_TICK_NS: u64 = 10_000_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KinematicSimulator {
    tick_ns: u64,
}

/// Outcome of one simulated run.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedRun {
    pub final_state: RobotStateSnapshot,
    pub ticks: u64,
    /// `ticks * tick_ns`.
    pub logical_duration_ns: u64,
    /// Peak joint speed times the tick length (rad): the most any joint can
    /// move within one tick.
    pub max_tick_step_rad: f64,
}

impl Default for KinematicSimulator {
    fn default() -> Self {
        Self::new(DEFAULT_TICK_NS)
    }
}

impl KinematicSimulator {
    /// A zero tick length is raised to 1 ns.
    #[must_use]
    pub fn new(tick_ns: u64) -> Self {
        Self {
            tick_ns: tick_ns.max(1),
        }
    }

    #[must_use]
    pub fn tick_ns(&self) -> u64 {
        self.tick_ns
    }

    /// Run `chunk` from `state`.
    ///
    /// Joints the chunk does not name keep their current positions.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::JointNotInState`] if the chunk names a joint
    /// the state lacks, or [`AdapterError::Contract`] if the resulting
    /// snapshot is invalid.
    pub fn simulate(
        &self,
        chunk: &JointTrajectoryChunk,
        state: &RobotStateSnapshot,
    ) -> Result<SimulatedRun, AdapterError> {
        let indices = chunk
            .joint_names()
            .iter()
            .map(|name| {
                state
                    .joint_names()
                    .iter()
                    .position(|n| n == name)
                    .ok_or_else(|| AdapterError::JointNotInState { joint: name.clone() })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let start: Vec<f64> = indices.iter().map(|&i| state.joint_positions()[i]).collect();
        let mut times = Vec::with_capacity(chunk.waypoints().len() + 1);
        times.push(0.0);
        times.extend(chunk.waypoint_times());
        let mut knots: Vec<&[f64]> = Vec::with_capacity(times.len());
        knots.push(&start);
        knots.extend(chunk.waypoints().iter().map(Vec::as_slice));

        let ticks = chunk.duration_nanos().div_ceil(self.tick_ns).max(1);
        let logical_duration_ns = ticks.saturating_mul(self.tick_ns);
        let clock = LogicalClock::new(state.captured_at(), ClockMode::Stepped);
        clock.step(logical_duration_ns)?;

        #[allow(clippy::cast_precision_loss)]
        let tick_s = self.tick_ns as f64 / 1e9;
        let max_step = peak_speed(&times, &knots) * tick_s;
        let posture = knots[knots.len() - 1];

        let mut positions = state.joint_positions().to_vec();
        for (&i, &p) in indices.iter().zip(posture) {
            positions[i] = p;
        }
        let final_state = state.advanced_to(positions, clock.now())?;
        Ok(SimulatedRun {
            final_state,
            ticks,
            logical_duration_ns,
            max_tick_step_rad: max_step,
        })
    }
}

/// Largest `|delta| / dt` of any joint over any segment (rad/s).
fn peak_speed(times: &[f64], knots: &[&[f64]]) -> f64 {
    times
        .windows(2)
        .zip(knots.windows(2))
        .filter(|(t, _)| t[1] > t[0])
        .flat_map(|(t, k)| {
            let dt = t[1] - t[0];
            k[0].iter().zip(k[1]).map(move |(a, b)| (b - a).abs() / dt)
        })
        .fold(0.0, f64::max)
}
