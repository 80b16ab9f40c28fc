//! End-to-end integration tests for the complete tracking flow.
//!
//! Drives the real binary: init → replay a recorded browsing session →
//! status/report, against an isolated store.

use std::io::Write as _;
use std::path::Path;
use std::process::Command;

use chrono::{Local, NaiveTime, TimeZone};
use tempfile::TempDir;

fn wt_binary() -> String {
    env!("CARGO_BIN_EXE_wt").to_string()
}

fn wt(temp: &Path, store: &Path, args: &[&str]) -> std::process::Output {
    Command::new(wt_binary())
        .env("HOME", temp)
        .env("WT_STORE_PATH", store)
        .args(args)
        .output()
        .expect("failed to run wt")
}

/// Epoch ms for today's local midnight plus an offset.
fn today_ms(offset_ms: i64) -> i64 {
    let midnight = Local::now().date_naive().and_time(NaiveTime::MIN);
    let base = Local
        .from_local_datetime(&midnight)
        .earliest()
        .expect("local midnight should exist")
        .timestamp_millis();
    base + offset_ms
}

const HOUR_MS: i64 = 3_600_000;

fn write_events(path: &Path) {
    let mut log = std::fs::File::create(path).unwrap();
    let t1 = today_ms(HOUR_MS);
    let t2 = today_ms(2 * HOUR_MS);
    let t3 = today_ms(3 * HOUR_MS);
    writeln!(
        log,
        r#"{{"at": {t1}, "type": "tab_created", "tab": {{"id": 1, "window_id": 1, "url": "https://www.youtube.com/watch", "active": true}}}}"#
    )
    .unwrap();
    writeln!(
        log,
        r#"{{"at": {t2}, "type": "tab_updated", "tab_id": 1, "url": "https://twitter.com/home", "tab": {{"id": 1, "window_id": 1, "url": "https://twitter.com/home", "active": true}}}}"#
    )
    .unwrap();
    writeln!(log, r#"{{"at": {t3}, "type": "suspend"}}"#).unwrap();
}

#[test]
fn init_replay_report_round_trip() {
    let temp = TempDir::new().unwrap();
    let store = temp.path().join("webtime.db");
    let events = temp.path().join("events.jsonl");
    write_events(&events);

    let output = wt(temp.path(), &store, &["init"]);
    assert!(
        output.status.success(),
        "wt init should succeed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(String::from_utf8_lossy(&output.stdout).contains("Initialized empty tracking store."));

    let output = wt(temp.path(), &store, &["replay", events.to_str().unwrap()]);
    assert!(
        output.status.success(),
        "wt replay should succeed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(String::from_utf8_lossy(&output.stdout).contains("Replayed 3 events"));

    // One hour on youtube, one on twitter, everything closed by suspend.
    let output = wt(temp.path(), &store, &["report", "--day", "--json"]);
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["total_focus_ms"], serde_json::json!(2 * HOUR_MS));
    assert_eq!(report["focus_by_domain"]["youtube.com"], serde_json::json!(HOUR_MS));
    assert_eq!(report["focus_by_domain"]["twitter.com"], serde_json::json!(HOUR_MS));
    assert_eq!(report["distinct_domains"], serde_json::json!(2));
}

#[test]
fn status_reflects_suspend_closing_everything() {
    let temp = TempDir::new().unwrap();
    let store = temp.path().join("webtime.db");
    let events = temp.path().join("events.jsonl");
    write_events(&events);

    assert!(wt(temp.path(), &store, &["init"]).status.success());
    assert!(wt(temp.path(), &store, &["replay", events.to_str().unwrap()]).status.success());

    let output = wt(temp.path(), &store, &["status"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Domains tracked: 2"), "unexpected status output: {stdout}");
    assert!(stdout.contains("Open sessions: 0"));
    assert!(stdout.contains("Focused: none"));
}

#[test]
fn human_report_renders_top_sites() {
    let temp = TempDir::new().unwrap();
    let store = temp.path().join("webtime.db");
    let events = temp.path().join("events.jsonl");
    write_events(&events);

    assert!(wt(temp.path(), &store, &["init"]).status.success());
    assert!(wt(temp.path(), &store, &["replay", events.to_str().unwrap()]).status.success());

    let output = wt(temp.path(), &store, &["report", "--day"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("BROWSING REPORT:"));
    assert!(stdout.contains("TOP SITES"));
    assert!(stdout.contains("youtube.com"));

    // Last week saw no browsing at all.
    let output = wt(temp.path(), &store, &["report", "--last-week"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("No browsing recorded in this period."));
}
