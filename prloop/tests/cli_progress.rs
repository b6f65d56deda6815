//! CLI tests for `prloop record-progress` and `prloop show-progress-history`.
//!
//! Spawns the binary against a scratch deployment root and checks exit codes,
//! stdout, and what lands in the ledger.

use std::path::Path;
use std::process::{Command, Output};

use chrono::Utc;
use prloop::core::backoff::parse_timestamp;
use prloop::exit_codes;
use prloop::io::ledger::Ledger;
use prloop::io::paths::DeploymentPaths;

fn prloop(root: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_prloop"))
        .current_dir(root)
        .arg("--root")
        .arg(root)
        .args(args)
        .env_remove("PRLOOP_ROOT")
        .output()
        .expect("spawn prloop")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

#[test]
fn record_progress_defaults_status_and_timestamp() {
    let temp = tempfile::tempdir().expect("tempdir");
    let before = Utc::now();

    let output = prloop(temp.path(), &["record-progress", "42", "fix-ci"]);

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert!(stdout(&output).contains("Total attempts recorded: 1"));

    let paths = DeploymentPaths::new(temp.path());
    let records = Ledger::new(&paths.ledger_path).read_all().expect("read");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].pr, "42");
    assert_eq!(records[0].branch, "fix-ci");
    assert_eq!(records[0].status, "unknown");

    let at = parse_timestamp(&records[0].timestamp).expect("timestamp");
    let drift = (at - before).num_seconds().abs();
    assert!(drift <= 2, "timestamp {at} too far from {before}");
}

#[test]
fn record_progress_keeps_explicit_values() {
    let temp = tempfile::tempdir().expect("tempdir");

    let output = prloop(
        temp.path(),
        &[
            "record-progress",
            "7",
            "feature",
            "2026-02-03T04:05:06Z",
            "success",
        ],
    );

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let paths = DeploymentPaths::new(temp.path());
    let last = Ledger::new(&paths.ledger_path)
        .read_last()
        .expect("read")
        .expect("record");
    assert_eq!(last.timestamp, "2026-02-03T04:05:06Z");
    assert_eq!(last.status, "success");
}

#[test]
fn record_progress_without_branch_is_a_usage_error() {
    let temp = tempfile::tempdir().expect("tempdir");

    let output = prloop(temp.path(), &["record-progress", "42"]);

    assert_eq!(output.status.code(), Some(exit_codes::FAILURE));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Usage"));
    assert!(!DeploymentPaths::new(temp.path()).ledger_path.exists());
}

#[test]
fn record_progress_rejects_unparseable_timestamp() {
    let temp = tempfile::tempdir().expect("tempdir");

    let output = prloop(
        temp.path(),
        &["record-progress", "42", "fix-ci", "last tuesday"],
    );

    assert_eq!(output.status.code(), Some(exit_codes::FAILURE));
    assert!(String::from_utf8_lossy(&output.stderr).contains("not ISO-8601"));
    assert!(!DeploymentPaths::new(temp.path()).ledger_path.exists());
}

#[test]
fn corrupt_ledger_bytes_do_not_fail_record_or_history() {
    let temp = tempfile::tempdir().expect("tempdir");
    let paths = DeploymentPaths::new(temp.path());
    std::fs::create_dir_all(&paths.state_dir).expect("mkdir");
    std::fs::write(&paths.ledger_path, b"\xff\n").expect("seed");

    let output = prloop(temp.path(), &["record-progress", "42", "fix-ci"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert!(stdout(&output).contains("Total attempts recorded: 1"));

    let output = prloop(temp.path(), &["show-progress-history"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert!(stdout(&output).contains("Total attempts: 1"));
}

#[test]
fn empty_history_is_not_an_error() {
    let temp = tempfile::tempdir().expect("tempdir");

    let output = prloop(temp.path(), &["show-progress-history"]);

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert_eq!(stdout(&output), "No progress history found.\n");
}

#[test]
fn history_shows_every_record_and_totals() {
    let temp = tempfile::tempdir().expect("tempdir");
    for (pr, status) in [("1", "failed"), ("2", "success"), ("1", "success")] {
        let output = prloop(temp.path(), &["record-progress", pr, "br", "", status]);
        assert_eq!(output.status.code(), Some(exit_codes::OK));
    }

    let output = prloop(temp.path(), &["show-progress-history"]);

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let out = stdout(&output);
    assert!(out.starts_with("PR"));
    assert!(out.contains("Total attempts: 3"));
    assert!(out.contains("Unique PRs: 2"));
    assert!(out.contains("Last 3 attempts:"));
}

#[test]
fn help_exits_ok() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = prloop(temp.path(), &["--help"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert!(stdout(&output).contains("record-progress"));
}
