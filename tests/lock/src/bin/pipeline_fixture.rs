//! Runs the reference scenario through the orchestrator in simulated mode
//! and prints deterministic `key=value` lines for cross-process checks.
//!
//! Usage: `pipeline_fixture [config.toml]`
//! Output:
//!   `config_digest`=sha256:...
//!   `plan_id`=sha256:...
//!   per chunk: `chunk_N`, `outcome_N`, `result_N`, `replay_N`
//!   `status_json`={...}

use std::path::Path;

use lock_tests::fixture::pipeline_lines;
use lock_tests::scenario::scenario_config;
use mrcp_harness::PipelineConfig;

fn main() {
    lock_tests::init_tracing();
    let config = match std::env::args().nth(1) {
        Some(path) => PipelineConfig::from_file(Path::new(&path)).expect("config loads"),
        None => scenario_config(),
    };
    for line in pipeline_lines(&config).expect("pipeline run failed") {
        println!("{line}");
    }
}
