//! Integration tests for the issuetree CLI.
//!
//! These tests run the built binary against snapshot files in a temporary
//! directory.

use issuetree::tracker::raw_issue;
use rstest::{fixture, rstest};
use serde_json::Value;
use tempfile::TempDir;

mod common;
use common::{run_issuetree_in_dir, write_snapshot};

// ============================================================================
// Test Fixtures
// ============================================================================

/// A temporary directory holding `issues.jsonl` with a small hierarchy.
///
/// Children point up at their parents only, through the parent link and
/// epic link fields. Timestamps are left at the builder default, so every
/// open issue is stale relative to the real clock.
#[fixture]
fn snapshot_dir() -> TempDir {
    let temp = TempDir::new().expect("Failed to create temp directory");
    write_snapshot(
        temp.path(),
        &[
            raw_issue("INIT-1").summary("Platform initiative").build(),
            raw_issue("EPIC-1")
                .summary("Storage epic")
                .parent_link("INIT-1")
                .assignee("ann")
                .build(),
            raw_issue("EPIC-2").summary("Done epic").parent_link("INIT-1").done().build(),
            raw_issue("STORY-1")
                .summary("Write the thing")
                .epic_link("EPIC-1")
                .done()
                .build(),
        ],
    );
    temp
}

fn stdout(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

// ============================================================================
// Help and Usage
// ============================================================================

#[test]
fn test_cli_help() {
    let temp = TempDir::new().unwrap();
    let output = run_issuetree_in_dir(temp.path(), &["--help"]);

    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("Usage:"));
    assert!(text.contains("rollup"));
}

#[test]
fn test_missing_snapshot_flag_fails() {
    let temp = TempDir::new().unwrap();
    let output = run_issuetree_in_dir(temp.path(), &["descendants", "INIT-1"]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("--snapshot"));
}

// ============================================================================
// Commands
// ============================================================================

#[rstest]
fn test_descendants_flat(snapshot_dir: TempDir) {
    let output = run_issuetree_in_dir(
        snapshot_dir.path(),
        &["--snapshot", "issues.jsonl", "descendants", "INIT-1", "--flat"],
    );

    assert!(output.status.success());
    assert_eq!(stdout(&output), "EPIC-1\nEPIC-2\nSTORY-1\n");
}

#[rstest]
fn test_descendants_tree(snapshot_dir: TempDir) {
    let output = run_issuetree_in_dir(
        snapshot_dir.path(),
        &["--snapshot", "issues.jsonl", "descendants", "INIT-1"],
    );

    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.starts_with("* INIT-1 Platform initiative (In Progress)\n"));
    assert!(text.contains("|   `-- STORY-1 Write the thing (Closed)"));
}

#[rstest]
fn test_descendants_json_excludes_root(snapshot_dir: TempDir) {
    let output = run_issuetree_in_dir(
        snapshot_dir.path(),
        &["--snapshot", "issues.jsonl", "--json", "descendants", "INIT-1"],
    );

    assert!(output.status.success());
    let json: Value = serde_json::from_slice(&output.stdout).unwrap();
    let steps = json.as_array().unwrap();
    let keys: Vec<_> = steps.iter().map(|s| s["key"].as_str().unwrap()).collect();
    assert_eq!(keys, vec!["EPIC-1", "EPIC-2", "STORY-1"]);
    assert_eq!(steps[2]["parent"], "EPIC-1");
    assert_eq!(steps[2]["depth"], 2);
}

#[rstest]
fn test_ancestors_json(snapshot_dir: TempDir) {
    let output = run_issuetree_in_dir(
        snapshot_dir.path(),
        &["--snapshot", "issues.jsonl", "--json", "ancestors", "STORY-1"],
    );

    assert!(output.status.success());
    let json: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["level"], 2);
    assert_eq!(json["ancestors"], serde_json::json!(["EPIC-1", "INIT-1"]));
}

#[rstest]
fn test_rollup_text(snapshot_dir: TempDir) {
    let output = run_issuetree_in_dir(
        snapshot_dir.path(),
        &[
            "--snapshot",
            "issues.jsonl",
            "rollup",
            "INIT-1",
            "--include-inactive",
        ],
    );

    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.starts_with("Status report: INIT-1 Platform initiative (In Progress)\n"));
    assert!(text.contains("Sub-issues: 2(Done), 1(Stale) - Total 3"));
    assert!(text.contains("EPIC-2 Done epic (Closed)"));
}

#[rstest]
fn test_rollup_json_skips_inactive(snapshot_dir: TempDir) {
    let output = run_issuetree_in_dir(
        snapshot_dir.path(),
        &["--snapshot", "issues.jsonl", "--json", "rollup", "INIT-1"],
    );

    assert!(output.status.success());
    let json: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["root"]["rollup"]["verdict"], "stale");
    assert_eq!(json["children"], serde_json::json!([]));
    assert_eq!(json["skipped"], serde_json::json!(["EPIC-1", "EPIC-2"]));
}

#[rstest]
fn test_rollup_accepts_threshold_beyond_duration_range(snapshot_dir: TempDir) {
    let output = run_issuetree_in_dir(
        snapshot_dir.path(),
        &[
            "--snapshot",
            "issues.jsonl",
            "--json",
            "rollup",
            "INIT-1",
            "--stale-after-days",
            "200000000000",
        ],
    );

    assert!(output.status.success());
    let json: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["root"]["rollup"]["verdict"], "on_track");
}

#[rstest]
fn test_config_file_is_discovered(snapshot_dir: TempDir) {
    std::fs::write(
        snapshot_dir.path().join("issuetree.yaml"),
        "rollup:\n  stale-after-days: 100000\n",
    )
    .unwrap();

    let output = run_issuetree_in_dir(
        snapshot_dir.path(),
        &["--snapshot", "issues.jsonl", "--json", "rollup", "INIT-1"],
    );

    assert!(output.status.success());
    let json: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["root"]["rollup"]["verdict"], "on_track");
}

#[rstest]
fn test_check_clean_hierarchy(snapshot_dir: TempDir) {
    let output = run_issuetree_in_dir(
        snapshot_dir.path(),
        &["--snapshot", "issues.jsonl", "check", "INIT-1"],
    );

    assert!(output.status.success());
    assert_eq!(stdout(&output), "INIT-1: hierarchy is well formed (4 issues)\n");
}

#[test]
fn test_check_reports_cycle_and_fails() {
    let temp = TempDir::new().unwrap();
    write_snapshot(
        temp.path(),
        &[
            raw_issue("A-1").subtask("A-2").build(),
            raw_issue("A-2").subtask("A-1").build(),
        ],
    );

    let output = run_issuetree_in_dir(temp.path(), &["--snapshot", "issues.jsonl", "check", "A-1"]);

    assert!(!output.status.success());
    assert!(stdout(&output).contains("cycle: A-1, A-2"));
}

#[test]
fn test_unknown_root_fails() {
    let temp = TempDir::new().unwrap();
    write_snapshot(temp.path(), &[raw_issue("A-1").build()]);

    let output = run_issuetree_in_dir(
        temp.path(),
        &["--snapshot", "issues.jsonl", "ancestors", "NOPE-1"],
    );

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("NOPE-1"));
}
