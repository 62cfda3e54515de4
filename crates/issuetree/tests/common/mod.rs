//! Common test utilities shared across integration tests.

#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use issuetree::cache::IssueCache;
use issuetree::domain::IssueKey;
use issuetree::tracker::SnapshotClient;
use issuetree::{Issue, Tracker};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::Arc;

/// Fixed "current time" for deterministic staleness checks.
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

/// A timestamp `days` before [`now`].
pub fn days_ago(days: i64) -> DateTime<Utc> {
    now() - Duration::days(days)
}

/// Shorthand for an issue key.
pub fn key(s: &str) -> IssueKey {
    IssueKey::new(s)
}

/// A tracker over `records` with a fresh cache, plus the client for
/// asserting fetch counts.
pub fn tracker_from(records: Vec<Value>) -> (Tracker, Arc<SnapshotClient>) {
    let client = Arc::new(SnapshotClient::from_records(records).unwrap());
    let tracker = Tracker::new(client.clone(), IssueCache::new());
    (tracker, client)
}

/// Resolve accessors for `keys`.
pub async fn issues(tracker: &Tracker, keys: &[&str]) -> Vec<Issue> {
    let mut out = Vec::with_capacity(keys.len());
    for k in keys {
        out.push(tracker.issue(&key(k)).await.unwrap());
    }
    out
}

/// Write `records` as a JSON Lines snapshot in `dir`.
pub fn write_snapshot(dir: &Path, records: &[Value]) -> PathBuf {
    let path = dir.join("issues.jsonl");
    let lines: Vec<String> = records.iter().map(Value::to_string).collect();
    std::fs::write(&path, lines.join("\n")).unwrap();
    path
}

/// Run the issuetree binary in `dir` with colors disabled.
pub fn run_issuetree_in_dir(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_issuetree"))
        .args(args)
        .current_dir(dir)
        .env("NO_COLOR", "1")
        .env("ISSUETREE_ASCII", "1")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute issuetree binary")
}
