//! End-to-end tests driving the `dt` binary the way editor and git hooks do.
//!
//! Tests the full pipeline: hook events → summaries → reports.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

use tempfile::TempDir;

fn dt_binary() -> String {
    env!("CARGO_BIN_EXE_dt").to_string()
}

/// Runs `dt` against a database inside `temp`, isolated from the user's config.
fn dt(temp: &Path, args: &[&str]) -> Output {
    let output = Command::new(dt_binary())
        .env("HOME", temp)
        .env("XDG_CONFIG_HOME", temp.join("config"))
        .env("DT_DATABASE_PATH", temp.join("data/dt.db"))
        .env_remove("DT_HOURLY_RATE")
        .env_remove("DT_MULTIPLIER")
        .args(args)
        .output()
        .expect("failed to run dt");
    assert!(
        output.status.success(),
        "dt {} should succeed: {}",
        args.join(" "),
        String::from_utf8_lossy(&output.stderr)
    );
    output
}

fn stdout(output: &Output) -> String {
    String::from_utf8(output.stdout.clone()).unwrap()
}

/// One hour session with a 30 second tool call and a single commit.
fn record_scenario(temp: &Path) {
    dt(
        temp,
        &[
            "link",
            "--repo",
            "/work/api",
            "--project",
            "proj-7",
            "--name",
            "api",
        ],
    );
    dt(
        temp,
        &[
            "session",
            "start",
            "--repo",
            "/work/api",
            "--at",
            "2025-03-10T09:00:00Z",
        ],
    );
    dt(
        temp,
        &[
            "tool",
            "start",
            "--repo",
            "/work/api",
            "--tool",
            "Bash",
            "--at",
            "2025-03-10T09:05:00Z",
        ],
    );
    dt(
        temp,
        &[
            "tool",
            "end",
            "--repo",
            "/work/api",
            "--tool",
            "Bash",
            "--exit-code",
            "0",
            "--at",
            "2025-03-10T09:05:30Z",
        ],
    );
    dt(
        temp,
        &[
            "commit",
            "--repo",
            "/work/api",
            "--hash",
            "abc1234def",
            "--message",
            "Add login",
            "--insertions",
            "10",
            "--deletions",
            "2",
            "--files-changed",
            "1",
            "--at",
            "2025-03-10T09:30:00Z",
        ],
    );
    dt(
        temp,
        &[
            "session",
            "end",
            "--repo",
            "/work/api",
            "--at",
            "2025-03-10T10:00:00Z",
        ],
    );
}

#[test]
fn test_hook_events_produce_daily_stats() {
    let temp = TempDir::new().unwrap();
    record_scenario(temp.path());

    let output = dt(
        temp.path(),
        &["stats", "--from", "2025-03-10", "--to", "2025-03-10", "--json"],
    );
    let report: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();

    assert_eq!(report["totals"]["sessions"], 1);
    assert_eq!(report["totals"]["dev_hours"], 1.0);
    assert_eq!(report["totals"]["commits"], 1);
    assert_eq!(report["commits_per_hour"], 1.0);
    assert_eq!(report["lines_per_hour"], 12.0);

    let active_hours = report["totals"]["active_hours"].as_f64().unwrap();
    assert!((active_hours - 30.0 / 3600.0).abs() < 1e-9);

    let day = &report["daily"][0];
    assert_eq!(day["project_key"], "proj-7");
    assert_eq!(day["repo_path"], "/work/api");
}

#[test]
fn test_duplicate_event_is_acknowledged_once() {
    let temp = TempDir::new().unwrap();
    let event = r#"{"kind":{"type":"session_start"},"repo_path":"/work/api","timestamp":"2025-03-10T09:00:00Z"}"#;

    let first = dt(temp.path(), &["ingest", "--event", event]);
    let second = dt(temp.path(), &["ingest", "--event", event]);

    let first: serde_json::Value = serde_json::from_str(&stdout(&first)).unwrap();
    let second: serde_json::Value = serde_json::from_str(&stdout(&second)).unwrap();
    assert_eq!(first["result"], "session");
    assert_eq!(first["outcome"], "applied");
    assert_eq!(second["result"], "duplicate");
    assert_eq!(first["event_id"], second["event_id"]);

    let status = stdout(&dt(temp.path(), &["status"]));
    assert!(status.contains("Active sessions: 1"), "{status}");
}

#[test]
fn test_ingest_reads_event_from_stdin() {
    let temp = TempDir::new().unwrap();
    let mut child = Command::new(dt_binary())
        .env("HOME", temp.path())
        .env("XDG_CONFIG_HOME", temp.path().join("config"))
        .env("DT_DATABASE_PATH", temp.path().join("data/dt.db"))
        .arg("ingest")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn dt");

    child
        .stdin
        .take()
        .unwrap()
        .write_all(
            br#"{"kind":{"type":"pre_tool_use","tool_name":"Edit"},"repo_path":"/work/api","timestamp":"2025-03-10T09:05:00Z"}"#,
        )
        .unwrap();
    let output = child.wait_with_output().unwrap();
    assert!(
        output.status.success(),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );

    let outcome: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(outcome["result"], "tool");
}

#[test]
fn test_invalid_event_is_rejected() {
    let temp = TempDir::new().unwrap();
    let output = Command::new(dt_binary())
        .env("HOME", temp.path())
        .env("XDG_CONFIG_HOME", temp.path().join("config"))
        .env("DT_DATABASE_PATH", temp.path().join("data/dt.db"))
        .args(["ingest", "--event", r#"{"kind":{"type":"commit"}}"#])
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("invalid event"));
}

#[test]
fn test_export_and_sync_queue() {
    let temp = TempDir::new().unwrap();
    record_scenario(temp.path());

    let csv = stdout(&dt(
        temp.path(),
        &["export", "--from", "2025-03-01", "--to", "2025-03-31"],
    ));
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(
        lines[0],
        "Date,Project,Phase,Hours,Commits,Lines Added,Lines Deleted,Capitalizable"
    );
    assert_eq!(lines[1], "2025-03-10,api,development,1.00,1,10,2,Yes");
    assert!(lines.contains(&"Capitalizable Hours,,,1.00,,,,"));

    let pending = stdout(&dt(temp.path(), &["sync", "pending", "--json"]));
    let pending: serde_json::Value = serde_json::from_str(&pending).unwrap();
    assert_eq!(pending[0]["hash"], "abc1234def");
    assert_eq!(pending[0]["project_key"], "proj-7");

    dt(temp.path(), &["sync", "mark-pushed", "abc1234def"]);
    let pending = stdout(&dt(temp.path(), &["sync", "pending"]));
    assert_eq!(pending.trim(), "No commits awaiting sync.");
}

#[test]
fn test_rebuild_keeps_stats() {
    let temp = TempDir::new().unwrap();
    record_scenario(temp.path());

    let rebuilt = stdout(&dt(temp.path(), &["rebuild"]));
    assert_eq!(
        rebuilt.trim(),
        "Rebuilt 1 daily summaries from 1 sessions and 1 commits."
    );

    let output = dt(
        temp.path(),
        &["stats", "--from", "2025-03-10", "--to", "2025-03-10", "--json"],
    );
    let report: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(report["totals"]["dev_hours"], 1.0);
    assert_eq!(report["lines_per_hour"], 12.0);
}
