//! Replay command: drive the engine from a recorded browser event log.
//!
//! The log is JSONL, one event per line, optionally stamped with the epoch-ms
//! time it occurred:
//!
//! ```json
//! {"at": 1700000000000, "type": "tab_created", "tab": {"id": 1, "window_id": 1, "url": "https://youtube.com", "active": true}}
//! ```

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use wt_engine::{BrowserEvent, Engine, ModelBrowser};
use wt_store::{KeyValue, Store};

/// One line of the replay log.
#[derive(Debug, Deserialize)]
struct ReplayRecord {
    /// When the event occurred; wall-clock time is used when absent.
    #[serde(default)]
    at: Option<i64>,
    #[serde(flatten)]
    event: BrowserEvent,
}

/// Feeds every event in the log through the engine. Returns the event count.
pub async fn run<S: KeyValue>(store: Store<S>, path: &Path) -> Result<usize> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let reader = BufReader::new(file);

    let browser = ModelBrowser::new();
    let engine = Engine::new(store, browser.clone());

    let mut replayed = 0_usize;
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: ReplayRecord = serde_json::from_str(&line)
            .with_context(|| format!("malformed event on line {}", line_no + 1))?;

        // The model must answer queries the way the live browser would after
        // this event, so it advances before the handler runs.
        browser.apply(&record.event);
        match record.at {
            Some(at) => engine.handle_at(record.event, at).await,
            None => engine.handle(record.event).await,
        }
        replayed += 1;
    }

    Ok(replayed)
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use wt_store::SqliteKv;

    use super::*;

    #[tokio::test]
    async fn replay_builds_sessions_from_a_log() {
        let dir = tempfile::tempdir().unwrap();
        let store_path = dir.path().join("webtime.db");
        let log_path = dir.path().join("events.jsonl");

        let mut log = File::create(&log_path).unwrap();
        writeln!(log, r#"{{"at": 1000, "type": "tab_created", "tab": {{"id": 1, "window_id": 1, "url": "https://youtube.com", "active": true}}}}"#).unwrap();
        writeln!(log).unwrap();
        writeln!(log, r#"{{"at": 61000, "type": "tab_updated", "tab_id": 1, "url": "https://twitter.com", "tab": {{"id": 1, "window_id": 1, "url": "https://twitter.com", "active": true}}}}"#).unwrap();
        writeln!(log, r#"{{"at": 121000, "type": "suspend"}}"#).unwrap();

        let store = Store::new(SqliteKv::open(&store_path).unwrap());
        let replayed = run(store, &log_path).await.unwrap();
        assert_eq!(replayed, 3);

        let store = Store::new(SqliteKv::open(&store_path).unwrap());
        let tracking = store.snapshot().await.unwrap();
        let (_, youtube) = tracking.domains["youtube.com"].iter().next().unwrap();
        assert_eq!(youtube.total, Some(60_000));
        let (_, twitter) = tracking.domains["twitter.com"].iter().next().unwrap();
        assert_eq!(twitter.total, Some(60_000));
        assert!(tracking.sessions().all(|(_, _, s)| !s.is_open()));
    }

    #[tokio::test]
    async fn replay_rejects_malformed_lines() {
        let dir = tempfile::tempdir().unwrap();
        let store_path = dir.path().join("webtime.db");
        let log_path = dir.path().join("events.jsonl");

        let mut log = File::create(&log_path).unwrap();
        writeln!(log, "not json").unwrap();

        let store = Store::new(SqliteKv::open(&store_path).unwrap());
        let err = run(store, &log_path).await.unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }
}
