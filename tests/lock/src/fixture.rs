//! Deterministic output produced by the fixture binaries.
//!
//! Each function returns `key=value` lines. The binaries print them; the
//! cross-process tests compare the printed lines with each other and with an
//! in-process call.

use mrcp_harness::{PipelineConfig, PipelineError, PipelineOrchestrator};
use mrcp_kernel::runtime::hash::HashDomain;
use mrcp_kernel::runtime::DeterminismRuntime;
use mrcp_safety::{SafetyVerificationEngine, VerifyError};

use crate::scenario::{
    chunk, nominal_state, perception, scenario_profile, state, wrist, wrist_chunk, INSTRUCTION,
    UNSTABLE_BASE_VELOCITY, UPRIGHT,
};

/// Plan, register, execute, and replay the reference scenario.
///
/// # Errors
///
/// Any [`PipelineError`] from the orchestrator.
pub fn pipeline_lines(config: &PipelineConfig) -> Result<Vec<String>, PipelineError> {
    let orchestrator = PipelineOrchestrator::from_config(config, None)?;
    let runtime = orchestrator.runtime().clone();
    let current = nominal_state();
    let plan_id = orchestrator.begin_plan(INSTRUCTION, &perception(), &current)?;

    let mut lines = vec![
        format!("config_digest={}", runtime.config_digest()),
        format!("plan_id={plan_id}"),
    ];
    let chunks = [wrist_chunk(0, 20.0), wrist_chunk(1, 150.0)];
    for c in chunks {
        let ordinal = c.ordinal();
        let chunk_id = orchestrator.register_chunk(&plan_id, c)?;
        let result = orchestrator.execute_chunk(&plan_id, &chunk_id, &current)?;
        lines.push(format!("chunk_{ordinal}={chunk_id}"));
        lines.push(format!("outcome_{ordinal}={}", result.outcome()));
        lines.push(format!(
            "result_{ordinal}={}",
            runtime.hash(HashDomain::ExecutionRecord, &result)?
        ));
        let replay = orchestrator.execute_chunk(&plan_id, &chunk_id, &current)?;
        lines.push(format!("replay_{ordinal}={}", replay.outcome()));
    }
    let status = orchestrator.robot_status_json(&config.robot.robot_id)?;
    lines.push(format!(
        "status_json={}",
        String::from_utf8_lossy(&status)
    ));
    Ok(lines)
}

/// Canonical report for each named safety scenario.
///
/// # Errors
///
/// [`VerifyError`] for malformed scenario input.
pub fn verify_lines() -> Result<Vec<String>, VerifyError> {
    let runtime = DeterminismRuntime::new(Default::default())?;
    let precision = runtime.config().float_precision;
    let engine = SafetyVerificationEngine::new(scenario_profile(), Default::default(), precision)?;
    let mut off_limits = wrist(0.1);
    off_limits[1] = 2.5;
    let cases = [
        ("nominal", wrist_chunk(0, 20.0), nominal_state()),
        ("force", wrist_chunk(0, 150.0), nominal_state()),
        ("stability", wrist_chunk(0, 20.0), state(UPRIGHT, UNSTABLE_BASE_VELOCITY)),
        ("continuity", chunk(0, &[wrist(0.1001), wrist(0.2)], 20.0), nominal_state()),
        ("joint_limit", chunk(0, &[wrist(0.05), off_limits], 150.0), nominal_state()),
    ];
    let mut lines = Vec::with_capacity(cases.len());
    for (name, c, s) in cases {
        let report = engine.verify(&c, &s)?;
        let bytes = runtime.canonicalize(&report)?;
        lines.push(format!("{name}={}", String::from_utf8_lossy(&bytes)));
    }
    Ok(lines)
}
