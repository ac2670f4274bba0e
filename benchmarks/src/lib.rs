//! Shared inputs for the MRCP benchmark suites.
//!
//! Setup failures are fatal: every helper panics rather than returning an
//! error, so a broken fixture never produces a misleading timing.

use mrcp_harness::{PipelineConfig, PipelineOrchestrator};
use mrcp_kernel::contracts::chunk::JointTrajectoryChunk;
use mrcp_kernel::contracts::ids::{ChunkId, PlanId};
use mrcp_kernel::contracts::profile::RobotProfile;
use mrcp_kernel::contracts::snapshot::{DetectedObject, PerceptionSnapshot, RobotStateSnapshot};
use mrcp_kernel::runtime::clock::LogicalTime;

pub const INSTRUCTION: &str = "pick up the red cup";

#[must_use]
pub fn profile() -> RobotProfile {
    RobotProfile::reference_cobot("bench_01")
}

#[must_use]
pub fn config() -> PipelineConfig {
    PipelineConfig {
        robot: profile(),
        ..PipelineConfig::default()
    }
}

fn joint_names(profile: &RobotProfile) -> Vec<String> {
    profile.joints.iter().map(|j| j.name.clone()).collect()
}

/// Upright state for `profile`, captured at logical time `captured_at_ns`.
///
/// # Panics
///
/// Panics if the snapshot is invalid.
#[must_use]
pub fn upright_state(profile: &RobotProfile, captured_at_ns: u64) -> RobotStateSnapshot {
    let names = joint_names(profile);
    let positions = vec![0.0; names.len()];
    RobotStateSnapshot::new(names, positions, LogicalTime::from_nanos(captured_at_ns))
        .expect("bench state")
        .with_base_motion(0.5, 0.0)
        .expect("bench base motion")
}

/// A perception snapshot with `objects` detections.
///
/// # Panics
///
/// Panics if the snapshot is invalid.
#[must_use]
pub fn perception(objects: usize) -> PerceptionSnapshot {
    let detections = (0..objects)
        .map(|i| {
            #[allow(clippy::cast_precision_loss)]
            let x = i as f64 * 0.1;
            DetectedObject::new(format!("object_{i}"), [x, -0.1, 0.75])
        })
        .collect();
    PerceptionSnapshot::new("sha256:bench", LogicalTime::ZERO)
        .with_objects(detections)
        .expect("bench perception")
}

/// A wrist sweep of `waypoints` evenly spaced steps from the upright
/// posture, 0.05 rad in total. Small enough to pass every check.
///
/// # Panics
///
/// Panics if the chunk is invalid.
#[must_use]
pub fn sweep_chunk(profile: &RobotProfile, ordinal: u32, waypoints: usize) -> JointTrajectoryChunk {
    let names = joint_names(profile);
    let steps = (0..waypoints)
        .map(|k| {
            #[allow(clippy::cast_precision_loss)]
            let angle = 0.05 * k as f64 / waypoints as f64;
            let mut posture = vec![0.0; names.len()];
            if let Some(wrist) = posture.last_mut() {
                *wrist = angle;
            }
            posture
        })
        .collect();
    JointTrajectoryChunk::new(ordinal, names, steps, 1.0, 20.0).expect("bench chunk")
}

/// An orchestrator with one plan and one registered chunk, ready to verify
/// and execute.
pub struct PreparedPlan {
    pub orchestrator: PipelineOrchestrator,
    pub plan_id: PlanId,
    pub chunk_id: ChunkId,
    pub state: RobotStateSnapshot,
}

/// # Panics
///
/// Panics if planning or registration fails.
#[must_use]
pub fn prepare_plan(waypoints: usize) -> PreparedPlan {
    let config = config();
    let orchestrator = PipelineOrchestrator::from_config(&config, None).expect("orchestrator");
    let state = upright_state(&config.robot, 0);
    let plan_id = orchestrator
        .begin_plan(INSTRUCTION, &perception(3), &state)
        .expect("begin_plan");
    let chunk_id = orchestrator
        .register_chunk(&plan_id, sweep_chunk(&config.robot, 0, waypoints))
        .expect("register_chunk");
    PreparedPlan {
        orchestrator,
        plan_id,
        chunk_id,
        state,
    }
}
