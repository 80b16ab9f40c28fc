//! Status command for showing what is currently open in the store.

use std::io::Write;
use std::path::Path;

use anyhow::Result;
use chrono::DateTime;

use wt_store::{KeyValue, Store};

fn format_ts(ms: i64) -> String {
    DateTime::from_timestamp_millis(ms)
        .map_or_else(|| ms.to_string(), |dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
}

pub async fn run<W: Write, S: KeyValue>(
    writer: &mut W,
    store: &Store<S>,
    store_path: &Path,
) -> Result<()> {
    let tracking = store.snapshot().await?;

    writeln!(writer, "Webtime status")?;
    writeln!(writer, "Store: {}", store_path.display())?;

    if tracking.domains.is_empty() {
        writeln!(writer, "No sessions recorded.")?;
        return Ok(());
    }

    let open: Vec<_> = tracking.sessions().filter(|(_, _, s)| s.is_open()).collect();
    let focused = open.iter().find(|(_, _, s)| s.has_open_focus());

    writeln!(writer, "Domains tracked: {}", tracking.domains.len())?;
    writeln!(writer, "Open sessions: {}", open.len())?;
    match focused {
        Some((domain, _, session)) => writeln!(
            writer,
            "Focused: {domain} (tab {}, window {})",
            session.tab_id, session.window_id
        )?,
        None => writeln!(writer, "Focused: none")?,
    }

    if !open.is_empty() {
        writeln!(writer, "Open:")?;
        for (domain, _, session) in open {
            writeln!(
                writer,
                "- {domain}: tab {}, window {}, since {}",
                session.tab_id,
                session.window_id,
                format_ts(session.start)
            )?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use wt_core::Reason;
    use wt_core::{TabId, WindowId};
    use wt_store::MemoryKv;

    use super::*;

    #[tokio::test]
    async fn status_reports_open_sessions_and_focus() {
        let store = Store::new(MemoryKv::new());
        let id = store
            .insert_session("youtube.com", TabId(12), WindowId(3), 1_700_000_000_000, Reason::TabCreated)
            .await
            .unwrap()
            .unwrap();
        store
            .insert_focus("youtube.com", &id, 1_700_000_000_000, Reason::TabActivated)
            .await
            .unwrap();
        let closed = store
            .insert_session("twitter.com", TabId(4), WindowId(3), 1_700_000_000_000, Reason::TabCreated)
            .await
            .unwrap()
            .unwrap();
        store
            .end_session("twitter.com", &closed, 1_700_000_005_000, Reason::TabRemoved)
            .await
            .unwrap();

        let mut output = Vec::new();
        run(&mut output, &store, &PathBuf::from("/tmp/webtime.db")).await.unwrap();
        let output = String::from_utf8(output).unwrap();

        assert!(output.contains("Domains tracked: 2"));
        assert!(output.contains("Open sessions: 1"));
        assert!(output.contains("Focused: youtube.com (tab 12, window 3)"));
        assert!(output.contains("- youtube.com: tab 12, window 3"));
        assert!(!output.contains("- twitter.com"));
    }

    #[tokio::test]
    async fn status_with_empty_store() {
        let store: Store<MemoryKv> = Store::new(MemoryKv::new());
        let mut output = Vec::new();
        run(&mut output, &store, &PathBuf::from("/tmp/webtime.db")).await.unwrap();
        let output = String::from_utf8(output).unwrap();
        assert!(output.contains("No sessions recorded."));
    }
}
