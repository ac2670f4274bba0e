//! Cart-table ZMP estimate over a planar serial chain.
//!
//! The arm is modelled as a planar chain rooted above the support polygon.
//! Joint angles are measured from vertical and accumulate along the chain, so
//! link `k` points along `sum(theta_0..=theta_k)`. Each link's mass sits at
//! its midpoint; the base mass sits at `x = 0`.
//!
//! Per trajectory sample (the current state at `t = 0`, then every waypoint
//! at its `time_from_start`):
//!
//! ```text
//! com_x  = sum(m_i * x_i) / total_mass
//! acc_x  = second finite difference of com_x over the sample times
//! zmp_x  = com_x - (com_height / g) * acc_x
//! ```
//!
//! The score starts from the worst support margin and pays penalties for base
//! motion and for payload carried at reach:
//!
//! ```text
//! margin = 1 - max|zmp_x| / support_half_length
//! score  = clamp(margin - 0.3 * base_velocity - 0.05 * payload * reach, 0, 1)
//! ```

use std::collections::BTreeMap;

use mrcp_kernel::contracts::chunk::JointTrajectoryChunk;
use mrcp_kernel::contracts::profile::RobotProfile;
use mrcp_kernel::contracts::snapshot::RobotStateSnapshot;
use mrcp_kernel::runtime::canon::{round_to_precision, EncodingError};

/// Standard gravity (m/s^2).
pub const GRAVITY: f64 = 9.81;

/// Score penalty per m/s of base velocity.
pub const BASE_VELOCITY_PENALTY: f64 = 0.3;

/// Score penalty per kg of payload at full reach.
pub const PAYLOAD_REACH_PENALTY: f64 = 0.05;

/// Result of [`estimate`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZmpEstimate {
    /// Stability score in `[0, 1]`, rounded to the determinism precision.
    pub score: f64,
    /// `1 - max|zmp_x| / support_half_length` before penalties.
    pub margin: f64,
    /// Largest horizontal ZMP offset over the trajectory (m).
    pub max_zmp_offset_m: f64,
    /// Largest tip extension as a fraction of chain length.
    pub reach: f64,
}

/// Horizontal COM and tip position for one posture (angles in profile order).
fn chain_com_and_tip(profile: &RobotProfile, angles: &[f64]) -> (f64, f64) {
    let mut cumulative = 0.0;
    let mut root_x = 0.0;
    let mut moment = 0.0;
    for (joint, angle) in profile.joints.iter().zip(angles) {
        cumulative += angle;
        let direction = cumulative.sin();
        let centre = root_x + 0.5 * joint.link_length_m * direction;
        moment += joint.link_mass_kg * centre;
        root_x += joint.link_length_m * direction;
    }
    let total = profile.total_mass_kg();
    let com = if total > 0.0 { moment / total } else { 0.0 };
    (com, root_x)
}

/// Second derivative at interior sample `j` on a non-uniform grid.
fn second_difference(t: &[f64], x: &[f64], j: usize) -> f64 {
    let h1 = t[j] - t[j - 1];
    let h2 = t[j + 1] - t[j];
    if h1 <= 0.0 || h2 <= 0.0 {
        return 0.0;
    }
    2.0 * ((x[j + 1] - x[j]) / h2 - (x[j] - x[j - 1]) / h1) / (h1 + h2)
}

/// Profile-ordered posture at every sample.
///
/// Joints not moved by the chunk hold their current-state position (zero if
/// the state omits them too).
fn postures(
    chunk: &JointTrajectoryChunk,
    state: &RobotStateSnapshot,
    profile: &RobotProfile,
) -> Vec<Vec<f64>> {
    let chunk_index: BTreeMap<&str, usize> = chunk
        .joint_names()
        .iter()
        .enumerate()
        .map(|(i, n)| (n.as_str(), i))
        .collect();
    let held: Vec<f64> = profile
        .joints
        .iter()
        .map(|j| state.position_of(&j.name).unwrap_or(0.0))
        .collect();

    let mut samples = Vec::with_capacity(chunk.waypoints().len() + 1);
    samples.push(held.clone());
    for wp in chunk.waypoints() {
        let posture = profile
            .joints
            .iter()
            .zip(&held)
            .map(|(j, &h)| chunk_index.get(j.name.as_str()).map_or(h, |&i| wp[i]))
            .collect();
        samples.push(posture);
    }
    samples
}

/// Deterministic stability estimate for `chunk` executed from `state`.
///
/// Inputs must already be validated (the engine does this).
///
/// # Errors
///
/// Returns [`EncodingError`] if the score cannot be rounded at `precision`.
pub fn estimate(
    chunk: &JointTrajectoryChunk,
    state: &RobotStateSnapshot,
    profile: &RobotProfile,
    precision: u32,
) -> Result<ZmpEstimate, EncodingError> {
    let mut times = Vec::with_capacity(chunk.waypoints().len() + 1);
    times.push(0.0);
    times.extend(chunk.waypoint_times());

    let (com, tip): (Vec<f64>, Vec<f64>) = postures(chunk, state, profile)
        .iter()
        .map(|angles| chain_com_and_tip(profile, angles))
        .unzip();

    let lever = profile.com_height_m / GRAVITY;
    let mut max_offset: f64 = 0.0;
    for j in 0..com.len() {
        let accel = if j == 0 || j + 1 == com.len() {
            0.0
        } else {
            second_difference(&times, &com, j)
        };
        max_offset = max_offset.max((com[j] - lever * accel).abs());
    }

    let chain = profile.chain_length_m();
    let reach = if chain > 0.0 {
        tip.iter().fold(0.0_f64, |m, x| m.max(x.abs())) / chain
    } else {
        0.0
    };

    let margin = 1.0 - max_offset / profile.support_half_length_m;
    let penalty = BASE_VELOCITY_PENALTY * state.base_velocity().abs()
        + PAYLOAD_REACH_PENALTY * state.payload_kg() * reach;
    let score = round_to_precision((margin - penalty).clamp(0.0, 1.0), precision)?;

    Ok(ZmpEstimate {
        score,
        margin,
        max_zmp_offset_m: max_offset,
        reach,
    })
}
