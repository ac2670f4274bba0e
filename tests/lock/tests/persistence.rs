//! The idempotency journal survives restarts and fails closed.

use std::path::Path;

use lock_tests::scenario::{nominal_state, perception, scenario_config, wrist_chunk, INSTRUCTION};
use mrcp_harness::persist::JOURNAL_FILENAME;
use mrcp_harness::{AdapterError, PipelineConfig, PipelineError, PipelineOrchestrator};
use mrcp_kernel::contracts::execution::ExecutionOutcome;
use mrcp_kernel::contracts::execution::ExecutionResult;

fn config_with_journal(dir: &Path) -> PipelineConfig {
    let mut config = scenario_config();
    config.execution.journal_path = Some(dir.join(JOURNAL_FILENAME));
    config
}

fn run(config: &PipelineConfig) -> (PipelineOrchestrator, ExecutionResult) {
    let o = PipelineOrchestrator::from_config(config, None).unwrap();
    let current = nominal_state();
    let p = o.begin_plan(INSTRUCTION, &perception(), &current).unwrap();
    let c = o.register_chunk(&p, wrist_chunk(0, 20.0)).unwrap();
    let r = o.execute_chunk(&p, &c, &current).unwrap();
    (o, r)
}

#[test]
fn replay_after_restart_is_cached() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_with_journal(dir.path());

    let (first_process, first) = run(&config);
    assert_eq!(first.outcome(), ExecutionOutcome::Executed);
    drop(first_process);

    let (second_process, replay) = run(&config);
    assert_eq!(replay.outcome(), ExecutionOutcome::Cached);
    assert!(first.same_payload(&replay));
    assert_eq!(second_process.adapter().backend_invocations(), 0);
    let canon = |r: &ExecutionResult| second_process.runtime().canonicalize(&r.as_cached()).unwrap();
    assert_eq!(canon(&first), canon(&replay));
}

#[test]
fn journal_holds_one_canonical_line_per_execution() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_with_journal(dir.path());
    let (o, r) = run(&config);
    // Replays and rejections are not journaled.
    let p = r.plan_id().clone();
    o.execute_chunk(&p, r.chunk_id(), &nominal_state()).unwrap();
    let bad = o.register_chunk(&p, wrist_chunk(1, 150.0)).unwrap();
    o.execute_chunk(&p, &bad, &nominal_state()).unwrap();

    let text = std::fs::read_to_string(dir.path().join(JOURNAL_FILENAME)).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 1);
    let line: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(line["record"]["outcome"], "executed");
    assert!(line["record_digest"].as_str().unwrap().starts_with("sha256:"));
}

#[test]
fn tampered_record_poisons_identifier() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_with_journal(dir.path());
    let (o, r) = run(&config);
    drop(o);

    let path = dir.path().join(JOURNAL_FILENAME);
    let text = std::fs::read_to_string(&path).unwrap();
    let tampered = text.replace("\"executed\"", "\"failed\"");
    assert_ne!(text, tampered);
    std::fs::write(&path, tampered).unwrap();

    let o = PipelineOrchestrator::from_config(&config, None).unwrap();
    let current = nominal_state();
    let p = o.begin_plan(INSTRUCTION, &perception(), &current).unwrap();
    let c = o.register_chunk(&p, wrist_chunk(0, 20.0)).unwrap();
    assert_eq!((&p, &c), (r.plan_id(), r.chunk_id()));
    assert!(matches!(
        o.execute_chunk(&p, &c, &current),
        Err(PipelineError::Poisoned { .. })
    ));
    assert_eq!(o.adapter().backend_invocations(), 0);
}

#[test]
fn corrupt_journal_refuses_to_start() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_with_journal(dir.path());
    std::fs::write(dir.path().join(JOURNAL_FILENAME), "not json\n").unwrap();
    assert!(matches!(
        PipelineOrchestrator::from_config(&config, None),
        Err(PipelineError::Execution(AdapterError::Journal(_)))
    ));
}
