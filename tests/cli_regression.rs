// Regression tests for the self-test binary: exit codes, report text and JSON.
// Requires: assert_cmd, predicates crates in [dev-dependencies]

use assert_cmd::Command;
use predicates::{prelude::PredicateBooleanExt, str::contains};

fn selftest() -> Command {
    Command::cargo_bin("mcp-harness-selftest").unwrap()
}

#[test]
fn demo_suites_pass_and_exit_cleanly() {
    selftest()
        .args(["--color", "never"])
        .assert()
        .success()
        .stdout(
            contains("PASS adds")
                .and(contains("SKIP divides by zero"))
                .and(contains("0 failed")),
        );
}

#[test]
fn deliberate_failure_sets_exit_code() {
    selftest()
        .args(["--color", "never", "--include-failing"])
        .assert()
        .code(1)
        .stdout(
            contains("FAIL fails on purpose")
                .and(contains("Expected 0.30000000000000004 to be 0.3"))
                .and(contains("1 failed")),
        );
}

#[test]
fn filter_narrows_the_run() {
    selftest()
        .args(["--color", "never", "--filter", "spies"])
        .assert()
        .success()
        .stdout(contains("spies keep the original behavior").and(contains("PASS adds").not()));
}

#[test]
fn json_output_is_machine_readable() {
    let output = selftest().args(["--json", "--include-failing"]).output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    let results: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let suites = results.as_array().unwrap();
    let regressions = suites.iter().find(|s| s["name"] == "Regressions").unwrap();
    assert_eq!(regressions["failed"], 1);
    assert_eq!(regressions["tests"][0]["error"]["kind"], "AssertionError");
}
