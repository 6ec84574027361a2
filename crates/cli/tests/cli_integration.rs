//! CLI integration tests for every subcommand.
//!
//! Uses `assert_cmd` to spawn the `statetrack` binary and verify exit codes
//! and output. Tests run from the crate directory so fixture paths resolve
//! relative to `tests/fixtures`.

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn crate_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).to_path_buf()
}

/// Helper: create a Command for the `statetrack` binary, rooted at the crate.
fn statetrack() -> Command {
    let mut cmd = cargo_bin_cmd!("statetrack");
    cmd.current_dir(crate_root());
    cmd.env_remove("RUST_LOG");
    cmd
}

const TRACE: &str = "tests/fixtures/open_timeout.json";
const DEFINITION: &str = "tests/fixtures/door.toml";

// ──────────────────────────────────────────────
// 1. Help and version
// ──────────────────────────────────────────────

#[test]
fn help_exits_0_with_description() {
    statetrack()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Replay and inspect recorded state machine traces",
        ));
}

#[test]
fn version_exits_0() {
    statetrack()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("statetrack"));
}

#[test]
fn missing_subcommand_is_a_usage_error() {
    statetrack().assert().failure().code(2);
}

// ──────────────────────────────────────────────
// 2. Replay
// ──────────────────────────────────────────────

#[test]
fn replay_prints_reconstructed_state() {
    statetrack()
        .args(["replay", TRACE, "--definition", DEFINITION])
        .assert()
        .success()
        .stdout(predicate::str::contains("current state: Alert"))
        .stdout(predicate::str::contains(
            "ClosedLocked -> ClosedUnlocked -> Open -> Alert",
        ));
}

#[test]
fn replay_json_respects_max_history() {
    let output = statetrack()
        .args([
            "--output",
            "json",
            "replay",
            TRACE,
            "--definition",
            DEFINITION,
            "--max-history",
            "2",
        ])
        .output()
        .unwrap();
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["tracker"]["history"], serde_json::json!(["Open", "Alert"]));
    assert_eq!(value["tracker"]["max_history"], 2);
    assert_eq!(value["records"], 14);
    assert_eq!(value["terminal"], true);
}

#[test]
fn replay_offers_outgoing_transitions_as_bookmarks() {
    let tmp = TempDir::new().unwrap();
    let trace = tmp.path().join("partial.json");
    let full: Vec<serde_json::Value> =
        serde_json::from_str(&fs::read_to_string(crate_root().join(TRACE)).unwrap()).unwrap();
    fs::write(&trace, serde_json::to_string(&full[..6]).unwrap()).unwrap();

    statetrack()
        .args(["replay", trace.to_str().unwrap(), "--definition", DEFINITION])
        .assert()
        .success()
        .stdout(predicate::str::contains("current state: ClosedUnlocked"))
        .stdout(predicate::str::contains(
            "transitions:   DoorOpened, UnlockedTimeout",
        ));
}

#[test]
fn replay_out_of_order_trace_exits_1() {
    statetrack()
        .args([
            "replay",
            "tests/fixtures/out_of_order.jsonl",
            "--definition",
            DEFINITION,
        ])
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("rejected:"));
}

#[test]
fn replay_save_writes_file_store() {
    let tmp = TempDir::new().unwrap();
    let store_dir = tmp.path().join("instances");
    let config = tmp.path().join("statetrack.toml");
    fs::write(
        &config,
        format!(
            "[store]\nconnection_string = \"file:{}\"\n",
            store_dir.display()
        ),
    )
    .unwrap();

    statetrack()
        .args([
            "--config",
            config.to_str().unwrap(),
            "replay",
            TRACE,
            "--definition",
            DEFINITION,
            "--save",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("saved to file:"));

    let saved = store_dir.join("6f1c2a94-3b7e-4d1a-9c55-0e8b7a2d4f10.json");
    let doc = fs::read_to_string(saved).unwrap();
    assert!(doc.contains("\"Alert\""));
}

#[test]
fn replay_missing_definition_exits_2() {
    statetrack()
        .args(["replay", TRACE, "--definition", "tests/fixtures/nope.toml"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("could not read"));
}

#[test]
fn bad_config_exits_2() {
    let tmp = TempDir::new().unwrap();
    let config = tmp.path().join("statetrack.toml");
    fs::write(&config, "[tracking]\nmax_history = 0\n").unwrap();
    statetrack()
        .args([
            "--config",
            config.to_str().unwrap(),
            "replay",
            TRACE,
            "--definition",
            DEFINITION,
        ])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("max_history"));
}

// ──────────────────────────────────────────────
// 3. Check and exists
// ──────────────────────────────────────────────

#[test]
fn check_in_order_passes() {
    statetrack()
        .args([
            "check",
            TRACE,
            "--definition",
            DEFINITION,
            "--in-order",
            "ClosedLocked,ClosedUnlocked,Open,Alert",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("ok:"));
}

#[test]
fn check_out_of_order_exits_1() {
    statetrack()
        .args([
            "check",
            TRACE,
            "--definition",
            DEFINITION,
            "--in-order",
            "Open,ClosedUnlocked",
        ])
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("state 'ClosedUnlocked' (position 1)"));
}

#[test]
fn check_json_reports_missing_state() {
    let output = statetrack()
        .args([
            "--output",
            "json",
            "check",
            TRACE,
            "--definition",
            DEFINITION,
            "--in-order",
            "ClosedLocked,IntrusionDetect",
        ])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["passed"], false);
    assert_eq!(value["missing"], "IntrusionDetect");
    assert_eq!(value["position"], 1);
}

#[test]
fn exists_finds_timeout_anywhere() {
    statetrack()
        .args(["exists", TRACE, "--activity", "OpenTimeout"])
        .assert()
        .success();
}

#[test]
fn exists_missing_activity_exits_1() {
    statetrack()
        .args([
            "exists",
            TRACE,
            "--activity",
            "UnlockedTimeout",
            "--state",
            "closed",
        ])
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("never reached closed"));
}

#[test]
fn exists_rejects_unknown_state_name() {
    statetrack()
        .args(["exists", TRACE, "--activity", "Open", "--state", "sleeping"])
        .assert()
        .failure()
        .code(2);
}

// ──────────────────────────────────────────────
// 4. Query
// ──────────────────────────────────────────────

#[test]
fn query_filters_by_activity_and_state() {
    statetrack()
        .args([
            "query",
            TRACE,
            "--activity",
            "DoorOpened",
            "--state",
            "closed",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("#7 DoorOpened [closed]"))
        .stdout(predicate::str::contains("1 of 14 records match"));
}

#[test]
fn query_json_honours_start_sequence() {
    let output = statetrack()
        .args(["--output", "json", "query", TRACE, "--from", "10"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let records = value.as_array().unwrap();
    assert_eq!(records.len(), 4);
    assert_eq!(records[0]["sequence_number"], 10);
    assert_eq!(records[0]["activity_name"], "OpenTimeout");
}

// ──────────────────────────────────────────────
// 5. Schema
// ──────────────────────────────────────────────

#[test]
fn schema_complete_scripts_pass() {
    statetrack()
        .args(["schema", "tests/fixtures/schema_complete"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ok: all 8 required objects"));
}

#[test]
fn schema_partial_scripts_list_missing_procedures() {
    statetrack()
        .args(["schema", "tests/fixtures/schema_partial"])
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("missing procedure CreateInstance"))
        .stdout(predicate::str::contains("missing procedure DeleteInstance"));
}

#[test]
fn schema_missing_dir_exits_2() {
    statetrack()
        .args(["schema", "tests/fixtures/no_such_dir"])
        .assert()
        .failure()
        .code(2);
}
