//! The browser lifecycle event stream consumed by the engine.

use serde::{Deserialize, Serialize};

use wt_core::{TabId, WindowId};

/// A tab as reported by the browser at one instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabSnapshot {
    pub id: TabId,
    pub window_id: WindowId,
    /// Absent while the tab has not committed a URL yet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Whether this is the selected tab of its window.
    #[serde(default)]
    pub active: bool,
}

/// A window and its tabs, as enumerated at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSnapshot {
    pub id: WindowId,
    /// Whether this window holds OS focus.
    #[serde(default)]
    pub focused: bool,
    #[serde(default)]
    pub tabs: Vec<TabSnapshot>,
}

/// One browser lifecycle event.
///
/// Events arrive asynchronously with no ordering or atomicity guarantees
/// against in-flight storage operations; each variant maps to one row of the
/// engine's transition table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BrowserEvent {
    TabCreated {
        tab: TabSnapshot,
    },
    /// A tab committed a new URL. `tab` is the post-navigation snapshot.
    TabUpdated {
        tab_id: TabId,
        url: String,
        tab: TabSnapshot,
    },
    TabActivated {
        tab_id: TabId,
        window_id: WindowId,
    },
    TabRemoved {
        tab_id: TabId,
        window_id: WindowId,
    },
    /// A tab left its window (drag-out); reattachment follows.
    TabDetached {
        tab_id: TabId,
        old_window_id: WindowId,
    },
    TabAttached {
        tab_id: TabId,
        new_window_id: WindowId,
    },
    /// Prerender/instant-navigation swap of one tab for another.
    TabReplaced {
        added_tab_id: TabId,
        removed_tab_id: TabId,
    },
    /// `None` means no window holds OS focus anymore.
    WindowFocusChanged {
        window_id: Option<WindowId>,
    },
    WindowRemoved {
        window_id: WindowId,
    },
    Startup,
    Suspend,
    Installed,
}

impl BrowserEvent {
    /// Short label for log lines.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::TabCreated { .. } => "tab_created",
            Self::TabUpdated { .. } => "tab_updated",
            Self::TabActivated { .. } => "tab_activated",
            Self::TabRemoved { .. } => "tab_removed",
            Self::TabDetached { .. } => "tab_detached",
            Self::TabAttached { .. } => "tab_attached",
            Self::TabReplaced { .. } => "tab_replaced",
            Self::WindowFocusChanged { .. } => "window_focus_changed",
            Self::WindowRemoved { .. } => "window_removed",
            Self::Startup => "startup",
            Self::Suspend => "suspend",
            Self::Installed => "installed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serialization_roundtrip() {
        let event = BrowserEvent::TabUpdated {
            tab_id: TabId(4),
            url: "https://youtube.com/watch".to_string(),
            tab: TabSnapshot {
                id: TabId(4),
                window_id: WindowId(1),
                url: Some("https://youtube.com/watch".to_string()),
                active: true,
            },
        };

        let json = serde_json::to_string(&event).unwrap();
        let parsed: BrowserEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, event);
    }

    #[test]
    fn events_are_tagged_by_type() {
        let json = serde_json::to_value(BrowserEvent::Suspend).unwrap();
        assert_eq!(json["type"], "suspend");

        let json = serde_json::to_value(BrowserEvent::WindowFocusChanged { window_id: None }).unwrap();
        assert_eq!(json["type"], "window_focus_changed");
        assert!(json["window_id"].is_null());
    }

    #[test]
    fn tab_snapshot_tolerates_missing_url() {
        let parsed: TabSnapshot =
            serde_json::from_str(r#"{"id": 3, "window_id": 1}"#).unwrap();
        assert_eq!(parsed.url, None);
        assert!(!parsed.active);
    }
}
