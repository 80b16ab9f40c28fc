//! The browser query collaborator.
//!
//! Browser APIs are asynchronous relative to the events they follow: by the
//! time a handler runs, the tab it concerns may already be gone. The trait
//! contract bakes that in — a racing lookup resolves to `None` and handlers
//! degrade to no-ops rather than erroring.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use wt_core::{TabId, WindowId};

use crate::event::{BrowserEvent, TabSnapshot, WindowSnapshot};

/// Read access to the browser's current tab/window state.
pub trait BrowserQuery: Send + Sync {
    /// Looks up a tab by id. `None` when it no longer exists.
    fn tab(&self, id: TabId) -> impl Future<Output = Option<TabSnapshot>> + Send;

    /// The active tab of a window. `None` when the window is gone or empty.
    fn active_tab(&self, window_id: WindowId) -> impl Future<Output = Option<TabSnapshot>> + Send;

    /// Every current window with its tabs (used by the startup handler).
    fn windows(&self) -> impl Future<Output = Vec<WindowSnapshot>> + Send;
}

#[derive(Debug, Default)]
struct ModelState {
    tabs: HashMap<TabId, TabSnapshot>,
    focused_window: Option<WindowId>,
}

/// An in-memory browser model driven by the event stream itself.
///
/// Feeding each [`BrowserEvent`] through [`ModelBrowser::apply`] before
/// handing it to the engine keeps the model answering queries the way the
/// live browser would after that event. Used by the replay command and as
/// the test double for the engine.
#[derive(Debug, Clone, Default)]
pub struct ModelBrowser {
    state: Arc<Mutex<ModelState>>,
}

impl ModelBrowser {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a tab without going through an event (pre-startup state).
    pub fn insert_tab(&self, tab: TabSnapshot) {
        let mut state = self.lock();
        state.tabs.insert(tab.id, tab);
    }

    /// Marks which window holds OS focus (pre-startup state).
    pub fn set_focused_window(&self, window_id: Option<WindowId>) {
        self.lock().focused_window = window_id;
    }

    /// Updates the model to the state the browser is in after `event`.
    pub fn apply(&self, event: &BrowserEvent) {
        let mut state = self.lock();
        match event {
            BrowserEvent::TabCreated { tab } => {
                if tab.active {
                    deactivate_window(&mut state.tabs, tab.window_id);
                }
                state.tabs.insert(tab.id, tab.clone());
            }
            BrowserEvent::TabUpdated { tab, .. } => {
                state.tabs.insert(tab.id, tab.clone());
            }
            BrowserEvent::TabActivated { tab_id, window_id } => {
                for tab in state.tabs.values_mut() {
                    if tab.window_id == *window_id {
                        tab.active = tab.id == *tab_id;
                    }
                }
            }
            BrowserEvent::TabRemoved { tab_id, .. } => {
                state.tabs.remove(tab_id);
            }
            BrowserEvent::TabAttached { tab_id, new_window_id } => {
                if let Some(tab) = state.tabs.get_mut(tab_id) {
                    tab.window_id = *new_window_id;
                }
            }
            BrowserEvent::TabReplaced { added_tab_id, removed_tab_id } => {
                if let Some(mut tab) = state.tabs.remove(removed_tab_id) {
                    tab.id = *added_tab_id;
                    state.tabs.insert(*added_tab_id, tab);
                }
            }
            BrowserEvent::WindowFocusChanged { window_id } => {
                state.focused_window = *window_id;
            }
            BrowserEvent::WindowRemoved { window_id } => {
                state.tabs.retain(|_, tab| tab.window_id != *window_id);
                if state.focused_window == Some(*window_id) {
                    state.focused_window = None;
                }
            }
            // Detached tabs stay addressable until reattached; lifecycle
            // events carry no tab state of their own.
            BrowserEvent::TabDetached { .. }
            | BrowserEvent::Startup
            | BrowserEvent::Suspend
            | BrowserEvent::Installed => {}
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ModelState> {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

fn deactivate_window(tabs: &mut HashMap<TabId, TabSnapshot>, window_id: WindowId) {
    for tab in tabs.values_mut() {
        if tab.window_id == window_id {
            tab.active = false;
        }
    }
}

impl BrowserQuery for ModelBrowser {
    async fn tab(&self, id: TabId) -> Option<TabSnapshot> {
        self.lock().tabs.get(&id).cloned()
    }

    async fn active_tab(&self, window_id: WindowId) -> Option<TabSnapshot> {
        self.lock()
            .tabs
            .values()
            .find(|tab| tab.window_id == window_id && tab.active)
            .cloned()
    }

    async fn windows(&self) -> Vec<WindowSnapshot> {
        let state = self.lock();
        let mut windows: HashMap<WindowId, WindowSnapshot> = HashMap::new();
        for tab in state.tabs.values() {
            windows
                .entry(tab.window_id)
                .or_insert_with(|| WindowSnapshot {
                    id: tab.window_id,
                    focused: state.focused_window == Some(tab.window_id),
                    tabs: Vec::new(),
                })
                .tabs
                .push(tab.clone());
        }
        let mut windows: Vec<WindowSnapshot> = windows.into_values().collect();
        windows.sort_by_key(|w| w.id);
        windows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tab(id: i64, window: i64, url: &str, active: bool) -> TabSnapshot {
        TabSnapshot {
            id: TabId(id),
            window_id: WindowId(window),
            url: Some(url.to_string()),
            active,
        }
    }

    #[tokio::test]
    async fn activation_is_exclusive_per_window() {
        let browser = ModelBrowser::new();
        browser.insert_tab(tab(1, 1, "https://youtube.com", true));
        browser.insert_tab(tab(2, 1, "https://twitter.com", false));
        browser.insert_tab(tab(3, 2, "https://example.com", true));

        browser.apply(&BrowserEvent::TabActivated { tab_id: TabId(2), window_id: WindowId(1) });

        assert_eq!(browser.active_tab(WindowId(1)).await.unwrap().id, TabId(2));
        // The other window keeps its own active tab.
        assert_eq!(browser.active_tab(WindowId(2)).await.unwrap().id, TabId(3));
    }

    #[tokio::test]
    async fn removed_tabs_vanish_from_lookup() {
        let browser = ModelBrowser::new();
        browser.insert_tab(tab(1, 1, "https://youtube.com", true));

        browser.apply(&BrowserEvent::TabRemoved { tab_id: TabId(1), window_id: WindowId(1) });
        assert!(browser.tab(TabId(1)).await.is_none());
    }

    #[tokio::test]
    async fn replace_rebinds_the_tab_id() {
        let browser = ModelBrowser::new();
        browser.insert_tab(tab(1, 1, "https://youtube.com", true));

        browser.apply(&BrowserEvent::TabReplaced { added_tab_id: TabId(9), removed_tab_id: TabId(1) });
        assert!(browser.tab(TabId(1)).await.is_none());
        assert_eq!(browser.tab(TabId(9)).await.unwrap().url.as_deref(), Some("https://youtube.com"));
    }

    #[tokio::test]
    async fn windows_reports_focus_flag() {
        let browser = ModelBrowser::new();
        browser.insert_tab(tab(1, 1, "https://youtube.com", true));
        browser.insert_tab(tab(2, 2, "https://twitter.com", true));
        browser.set_focused_window(Some(WindowId(2)));

        let windows = browser.windows().await;
        assert_eq!(windows.len(), 2);
        assert!(!windows[0].focused);
        assert!(windows[1].focused);
    }
}
