//! Cross-process determinism.
//!
//! Spawns the fixture binaries under several environment variants and
//! asserts every run prints byte-identical output, equal to the in-process
//! result. Working directory, locale, unrelated variables, and log level
//! must not influence identifiers, results, or status.

use std::path::{Path, PathBuf};
use std::process::Command;

use lock_tests::fixture::{pipeline_lines, verify_lines};
use lock_tests::scenario::scenario_config;
use mrcp_harness::PipelineConfig;

fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .and_then(Path::parent)
        .expect("workspace root exists")
        .to_path_buf()
}

fn config_fixture() -> PathBuf {
    workspace_root().join("tests/fixtures/pipeline.toml")
}

/// Fixture binaries live one level above the test binary's `deps/` dir.
fn binary_path(name: &str) -> PathBuf {
    let mut path = std::env::current_exe()
        .expect("can resolve test binary path")
        .parent()
        .expect("binary dir exists")
        .parent()
        .expect("deps parent exists")
        .to_path_buf();
    path.push(name);
    path
}

fn run(bin: &str, args: &[&Path], work_dir: &Path, env: &[(&str, &str)]) -> String {
    let bin = binary_path(bin);
    let mut command = Command::new(&bin);
    command
        .args(args)
        .current_dir(work_dir)
        .env_remove("LC_ALL")
        .env_remove("LC_COLLATE")
        .env_remove("LANG")
        .env_remove("LANGUAGE")
        .env_remove("RUST_LOG");
    for &(k, v) in env {
        command.env(k, v);
    }
    let output = command.output().unwrap_or_else(|e| {
        panic!("failed to spawn {} (cwd={}, env={env:?}): {e}", bin.display(), work_dir.display())
    });
    assert!(
        output.status.success(),
        "{} exited with {}: stderr={}",
        bin.display(),
        output.status,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout).expect("stdout is valid UTF-8")
}

fn variants() -> Vec<(PathBuf, Vec<(&'static str, &'static str)>)> {
    let root = workspace_root();
    vec![
        (root.clone(), vec![]),
        (std::env::temp_dir(), vec![]),
        (root.clone(), vec![("LC_ALL", "C"), ("LANG", "C")]),
        (
            root.clone(),
            vec![
                ("MRCP_NOISE", "1"),
                ("TZ", "Pacific/Chatham"),
                ("HOME", "/nonexistent"),
            ],
        ),
        (root, vec![("RUST_LOG", "debug")]),
    ]
}

fn assert_all_equal(bin: &str, args: &[&Path], expected: &str) {
    for (dir, env) in variants() {
        let out = run(bin, args, &dir, &env);
        assert_eq!(
            out,
            expected,
            "{bin} output differs (cwd={}, env={env:?})",
            dir.display()
        );
    }
}

fn joined(lines: &[String]) -> String {
    let mut s = lines.join("\n");
    s.push('\n');
    s
}

#[test]
fn pipeline_fixture_is_process_independent() {
    let expected = joined(&pipeline_lines(&scenario_config()).unwrap());
    assert!(expected.contains("outcome_0=executed"));
    assert!(expected.contains("replay_0=cached"));
    assert!(expected.contains("outcome_1=rejected"));
    assert_all_equal("pipeline_fixture", &[], &expected);
}

#[test]
fn verify_fixture_is_process_independent() {
    let expected = joined(&verify_lines().unwrap());
    assert_all_equal("verify_fixture", &[], &expected);
}

#[test]
fn toml_fixture_matches_built_in_scenario() {
    let path = config_fixture();
    assert_eq!(PipelineConfig::from_file(&path).unwrap(), scenario_config());

    let expected = joined(&pipeline_lines(&scenario_config()).unwrap());
    assert_all_equal("pipeline_fixture", &[path.as_path()], &expected);
}
