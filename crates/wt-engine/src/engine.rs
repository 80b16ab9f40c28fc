//! Maps browser lifecycle events onto session/focus operations.
//!
//! Each handler is one row of the transition table: a `(window, tab)` pair
//! moves through no-session → session-open → session-open+focused and back,
//! with cross-cutting rules (one focused tab per window, one focused window
//! globally) enforced before a new focus interval starts. Handlers tolerate
//! the browser racing ahead of them — a vanished tab degrades to a no-op —
//! and no handler error ever escapes the event loop.

use std::sync::Mutex;

use wt_core::url::{extract_domain, is_eligible};
use wt_core::{Reason, TabId, WindowId};
use wt_store::{KeyValue, Store, StoreError};

use crate::browser::BrowserQuery;
use crate::event::{BrowserEvent, TabSnapshot};

/// The event reconciliation layer.
pub struct Engine<S, B> {
    store: Store<S>,
    browser: B,
    /// The tab currently holding system-wide focus, if any.
    ///
    /// Process-wide diagnostic state: empty at construction, rebuilt by the
    /// startup handler, written only by event handlers. Aggregation never
    /// reads it — persisted focus records are the single source of truth.
    focused: Mutex<Option<(WindowId, TabId)>>,
}

impl<S: KeyValue, B: BrowserQuery> Engine<S, B> {
    pub fn new(store: Store<S>, browser: B) -> Self {
        Self {
            store,
            browser,
            focused: Mutex::new(None),
        }
    }

    /// The underlying store, for read-only consumers (status, reports).
    pub fn store(&self) -> &Store<S> {
        &self.store
    }

    /// The focused-tab pointer, for diagnostics only.
    pub fn focused_tab(&self) -> Option<(WindowId, TabId)> {
        *self.lock_focused()
    }

    /// Handles one event at the current wall-clock time.
    pub async fn handle(&self, event: BrowserEvent) {
        let now = chrono::Utc::now().timestamp_millis();
        self.handle_at(event, now).await;
    }

    /// Handles one event at an explicit timestamp.
    ///
    /// Errors are logged and swallowed here: one failing handler loses at
    /// most its own interval (best-effort analytics, not a ledger) and must
    /// never block delivery of subsequent events.
    pub async fn handle_at(&self, event: BrowserEvent, now: i64) {
        let label = event.label();
        tracing::debug!(event = label, now, "handling browser event");
        if let Err(error) = self.dispatch(event, now).await {
            tracing::error!(event = label, %error, "event handler failed");
        }
    }

    async fn dispatch(&self, event: BrowserEvent, now: i64) -> Result<(), StoreError> {
        match event {
            BrowserEvent::TabCreated { tab } => self.on_tab_created(tab, now).await,
            BrowserEvent::TabUpdated { tab_id, url, tab } => {
                self.on_tab_updated(tab_id, &url, &tab, now).await
            }
            BrowserEvent::TabActivated { tab_id, window_id } => {
                self.on_tab_activated(tab_id, window_id, now).await
            }
            BrowserEvent::TabRemoved { tab_id, window_id } => {
                self.on_tab_removed(tab_id, window_id, now).await
            }
            BrowserEvent::TabDetached { tab_id, old_window_id } => {
                self.on_tab_detached(tab_id, old_window_id, now).await
            }
            BrowserEvent::TabAttached { tab_id, new_window_id } => {
                self.on_tab_attached(tab_id, new_window_id, now).await
            }
            BrowserEvent::TabReplaced { added_tab_id, removed_tab_id } => {
                self.on_tab_replaced(added_tab_id, removed_tab_id).await
            }
            BrowserEvent::WindowFocusChanged { window_id } => {
                self.on_window_focus_changed(window_id, now).await
            }
            BrowserEvent::WindowRemoved { window_id } => {
                self.on_window_removed(window_id, now).await
            }
            BrowserEvent::Startup => self.on_startup(now).await,
            BrowserEvent::Suspend => self.on_suspend(now).await,
            BrowserEvent::Installed => self.store.reset().await,
        }
    }

    async fn on_tab_created(&self, tab: TabSnapshot, now: i64) -> Result<(), StoreError> {
        let Some(url) = tab.url.as_deref() else {
            return Ok(());
        };
        if !is_eligible(url) {
            return Ok(());
        }
        let domain = extract_domain(url);
        let session = self
            .store
            .insert_session(&domain, tab.id, tab.window_id, now, Reason::TabCreated)
            .await?;
        if tab.active {
            if let Some(session_id) = session {
                self.store
                    .end_focus_except_tab(tab.window_id, tab.id, now, Reason::TabCreated)
                    .await?;
                self.store
                    .insert_focus(&domain, &session_id, now, Reason::TabCreated)
                    .await?;
                self.set_focused(Some((tab.window_id, tab.id)));
            }
        }
        Ok(())
    }

    async fn on_tab_updated(
        &self,
        tab_id: TabId,
        url: &str,
        tab: &TabSnapshot,
        now: i64,
    ) -> Result<(), StoreError> {
        let new_eligible = is_eligible(url);
        let new_domain = extract_domain(url);

        // The previous URL is unknown; the open session for this tab is the
        // only record of what the tab was displaying.
        let previous = self.store.open_session_for_tab(tab_id, tab.window_id).await?;
        let domain_changed = previous
            .as_ref()
            .is_none_or(|(domain, _)| *domain != new_domain);

        if let Some((prev_domain, prev_id)) = &previous {
            if domain_changed || !new_eligible {
                self.store
                    .end_focus(prev_domain, prev_id, now, Reason::DomainChanged)
                    .await?;
                self.store
                    .end_session(prev_domain, prev_id, now, Reason::DomainChanged)
                    .await?;
                self.clear_focused_if(tab.window_id, tab_id);
            }
        }

        if new_eligible && domain_changed {
            let session = self
                .store
                .insert_session(&new_domain, tab_id, tab.window_id, now, Reason::TabUpdated)
                .await?;
            if tab.active {
                if let Some(session_id) = session {
                    self.store
                        .end_focus_except_tab(tab.window_id, tab_id, now, Reason::TabDeactivated)
                        .await?;
                    self.store
                        .insert_focus(&new_domain, &session_id, now, Reason::TabUpdated)
                        .await?;
                    self.set_focused(Some((tab.window_id, tab_id)));
                }
            }
        }
        // Same domain, still eligible: the logical session continues.
        Ok(())
    }

    async fn on_tab_activated(
        &self,
        tab_id: TabId,
        window_id: WindowId,
        now: i64,
    ) -> Result<(), StoreError> {
        // The tab may have closed before this handler ran.
        let Some(tab) = self.browser.tab(tab_id).await else {
            return Ok(());
        };
        let Some(url) = tab.url.as_deref() else {
            return Ok(());
        };

        self.store
            .end_focus_except_tab(window_id, tab_id, now, Reason::TabDeactivated)
            .await?;

        if !is_eligible(url) {
            return Ok(());
        }
        let domain = extract_domain(url);
        let session_id = match self
            .store
            .find_active_session(&domain, tab.window_id, tab_id)
            .await?
        {
            Some(id) => Some(id),
            None => {
                self.store
                    .insert_session(&domain, tab_id, tab.window_id, now, Reason::TabActivated)
                    .await?
            }
        };
        if let Some(session_id) = session_id {
            self.store
                .insert_focus(&domain, &session_id, now, Reason::TabActivated)
                .await?;
            self.set_focused(Some((tab.window_id, tab_id)));
        }
        Ok(())
    }

    async fn on_tab_removed(
        &self,
        tab_id: TabId,
        window_id: WindowId,
        now: i64,
    ) -> Result<(), StoreError> {
        self.store
            .find_and_end_session(tab_id, window_id, now, Reason::TabRemoved)
            .await?;
        self.clear_focused_if(window_id, tab_id);
        Ok(())
    }

    async fn on_tab_detached(
        &self,
        tab_id: TabId,
        old_window_id: WindowId,
        now: i64,
    ) -> Result<(), StoreError> {
        // The session survives the move; only focus pauses until reattach.
        if let Some((domain, session_id)) =
            self.store.open_session_for_tab(tab_id, old_window_id).await?
        {
            self.store
                .end_focus(&domain, &session_id, now, Reason::TabDetached)
                .await?;
        }
        self.clear_focused_if(old_window_id, tab_id);
        Ok(())
    }

    async fn on_tab_attached(
        &self,
        tab_id: TabId,
        new_window_id: WindowId,
        now: i64,
    ) -> Result<(), StoreError> {
        let Some((domain, session_id)) =
            self.store.move_session_to_window(tab_id, new_window_id).await?
        else {
            return Ok(());
        };
        let Some(tab) = self.browser.tab(tab_id).await else {
            return Ok(());
        };
        if tab.active {
            self.store
                .end_focus_except_tab(new_window_id, tab_id, now, Reason::TabDeactivated)
                .await?;
            self.store
                .insert_focus(&domain, &session_id, now, Reason::TabActivated)
                .await?;
            self.set_focused(Some((new_window_id, tab_id)));
        }
        Ok(())
    }

    async fn on_tab_replaced(
        &self,
        added_tab_id: TabId,
        removed_tab_id: TabId,
    ) -> Result<(), StoreError> {
        self.store.replace_session_tab(added_tab_id, removed_tab_id).await?;
        let mut focused = self.lock_focused();
        if let Some((window_id, tab_id)) = *focused {
            if tab_id == removed_tab_id {
                *focused = Some((window_id, added_tab_id));
            }
        }
        Ok(())
    }

    async fn on_window_focus_changed(
        &self,
        window_id: Option<WindowId>,
        now: i64,
    ) -> Result<(), StoreError> {
        let Some(window_id) = window_id else {
            // The browser itself lost OS focus.
            self.store.end_all_focus(now, Reason::WindowFocusLost).await?;
            self.set_focused(None);
            return Ok(());
        };

        self.store
            .end_focus_outside_window(window_id, now, Reason::WindowFocusLost)
            .await?;

        let Some(tab) = self.browser.active_tab(window_id).await else {
            return Ok(());
        };
        let Some(url) = tab.url.as_deref() else {
            return Ok(());
        };
        if !is_eligible(url) {
            return Ok(());
        }
        let domain = extract_domain(url);
        let session_id = match self
            .store
            .find_active_session(&domain, tab.window_id, tab.id)
            .await?
        {
            Some(id) => Some(id),
            None => {
                self.store
                    .insert_session(&domain, tab.id, tab.window_id, now, Reason::WindowFocusGained)
                    .await?
            }
        };
        if let Some(session_id) = session_id {
            self.store
                .insert_focus(&domain, &session_id, now, Reason::WindowFocusGained)
                .await?;
            self.set_focused(Some((window_id, tab.id)));
        }
        Ok(())
    }

    async fn on_window_removed(&self, window_id: WindowId, now: i64) -> Result<(), StoreError> {
        self.store
            .end_sessions_in_window(window_id, now, Reason::WindowRemoved)
            .await?;
        let mut focused = self.lock_focused();
        if focused.is_some_and(|(w, _)| w == window_id) {
            *focused = None;
        }
        Ok(())
    }

    /// Seeds sessions for every tab alive at startup and rebuilds the
    /// focused-tab pointer from a fresh enumeration.
    async fn on_startup(&self, now: i64) -> Result<(), StoreError> {
        self.set_focused(None);
        for window in self.browser.windows().await {
            for tab in window.tabs {
                let Some(url) = tab.url.as_deref() else {
                    continue;
                };
                if !is_eligible(url) {
                    continue;
                }
                let domain = extract_domain(url);
                let session = self
                    .store
                    .insert_session(&domain, tab.id, window.id, now, Reason::Startup)
                    .await?;
                if tab.active && window.focused {
                    if let Some(session_id) = session {
                        self.store
                            .insert_focus(&domain, &session_id, now, Reason::Startup)
                            .await?;
                        self.set_focused(Some((window.id, tab.id)));
                    }
                }
            }
        }
        Ok(())
    }

    /// Persist-before-teardown safety net: nothing stays open.
    async fn on_suspend(&self, now: i64) -> Result<(), StoreError> {
        self.store.end_all_focus(now, Reason::Suspend).await?;
        self.store.end_all_sessions(now, Reason::Suspend).await?;
        self.set_focused(None);
        Ok(())
    }

    fn set_focused(&self, value: Option<(WindowId, TabId)>) {
        *self.lock_focused() = value;
    }

    fn clear_focused_if(&self, window_id: WindowId, tab_id: TabId) {
        let mut focused = self.lock_focused();
        if *focused == Some((window_id, tab_id)) {
            *focused = None;
        }
    }

    fn lock_focused(&self) -> std::sync::MutexGuard<'_, Option<(WindowId, TabId)>> {
        self.focused.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use wt_core::Tracking;
    use wt_store::MemoryKv;

    use super::*;
    use crate::browser::ModelBrowser;

    struct Harness {
        engine: Engine<MemoryKv, ModelBrowser>,
        browser: ModelBrowser,
    }

    fn harness() -> Harness {
        let browser = ModelBrowser::new();
        let engine = Engine::new(Store::new(MemoryKv::new()), browser.clone());
        Harness { engine, browser }
    }

    impl Harness {
        /// Advances the browser model past `event`, then hands it to the
        /// engine — the order a live browser presents to handlers.
        async fn drive(&self, event: BrowserEvent, now: i64) {
            self.browser.apply(&event);
            self.engine.handle_at(event, now).await;
        }

        async fn snapshot(&self) -> Tracking {
            self.engine.store().snapshot().await.unwrap()
        }
    }

    fn created(id: i64, window: i64, url: &str, active: bool) -> BrowserEvent {
        BrowserEvent::TabCreated {
            tab: TabSnapshot {
                id: TabId(id),
                window_id: WindowId(window),
                url: Some(url.to_string()),
                active,
            },
        }
    }

    fn navigated(id: i64, window: i64, url: &str, active: bool) -> BrowserEvent {
        BrowserEvent::TabUpdated {
            tab_id: TabId(id),
            url: url.to_string(),
            tab: TabSnapshot {
                id: TabId(id),
                window_id: WindowId(window),
                url: Some(url.to_string()),
                active,
            },
        }
    }

    fn open_focus_count(tracking: &Tracking) -> usize {
        tracking
            .sessions()
            .flat_map(|(_, _, s)| s.focus.values())
            .filter(|f| f.is_open())
            .count()
    }

    fn open_session_count(tracking: &Tracking) -> usize {
        tracking.sessions().filter(|(_, _, s)| s.is_open()).count()
    }

    #[tokio::test]
    async fn active_tab_creation_opens_session_and_focus() {
        let h = harness();
        h.drive(created(1, 1, "https://youtube.com/watch", true), 1_000).await;

        let tracking = h.snapshot().await;
        let (_, session) = tracking.domains["youtube.com"].iter().next().unwrap();
        assert!(session.is_open());
        assert_eq!(session.reason, Reason::TabCreated);
        assert!(session.has_open_focus());
        assert_eq!(h.engine.focused_tab(), Some((WindowId(1), TabId(1))));
    }

    #[tokio::test]
    async fn inactive_tab_creation_opens_session_without_focus() {
        let h = harness();
        h.drive(created(1, 1, "https://youtube.com", false), 1_000).await;

        let tracking = h.snapshot().await;
        assert_eq!(open_session_count(&tracking), 1);
        assert_eq!(open_focus_count(&tracking), 0);
        assert_eq!(h.engine.focused_tab(), None);
    }

    #[tokio::test]
    async fn ineligible_tab_creation_is_invisible() {
        let h = harness();
        h.drive(created(1, 1, "chrome://settings", true), 1_000).await;

        assert!(h.snapshot().await.domains.is_empty());
        assert_eq!(h.engine.focused_tab(), None);
    }

    #[tokio::test]
    async fn domain_change_rolls_the_session_over() {
        let h = harness();
        h.drive(created(1, 1, "https://youtube.com/a", true), 1_000).await;
        h.drive(navigated(1, 1, "https://twitter.com/home", true), 5_000).await;

        let tracking = h.snapshot().await;

        let (_, old) = tracking.domains["youtube.com"].iter().next().unwrap();
        assert_eq!(old.end, Some(5_000));
        assert_eq!(old.total, Some(4_000));
        assert_eq!(old.end_reason, Some(Reason::DomainChanged));
        let old_focus = old.focus.values().next().unwrap();
        assert_eq!(old_focus.end, Some(5_000));
        assert_eq!(old_focus.end_reason, Some(Reason::DomainChanged));

        let (_, new) = tracking.domains["twitter.com"].iter().next().unwrap();
        assert!(new.is_open());
        assert!(new.has_open_focus());
        assert_eq!(open_focus_count(&tracking), 1);
    }

    #[tokio::test]
    async fn same_domain_navigation_is_a_noop() {
        let h = harness();
        h.drive(created(1, 1, "https://youtube.com/a", true), 1_000).await;
        let before = h.snapshot().await;

        h.drive(navigated(1, 1, "https://youtube.com/b", true), 5_000).await;
        assert_eq!(h.snapshot().await, before, "the logical session continues");
    }

    #[tokio::test]
    async fn navigation_to_ineligible_url_ends_the_session() {
        let h = harness();
        h.drive(created(1, 1, "https://youtube.com", true), 1_000).await;
        h.drive(navigated(1, 1, "chrome://settings", true), 4_000).await;

        let tracking = h.snapshot().await;
        assert_eq!(open_session_count(&tracking), 0);
        assert_eq!(open_focus_count(&tracking), 0);
        let (_, session) = tracking.domains["youtube.com"].iter().next().unwrap();
        assert_eq!(session.end_reason, Some(Reason::DomainChanged));
    }

    #[tokio::test]
    async fn tab_removal_ends_focus_and_session() {
        let h = harness();
        h.drive(created(1, 1, "https://youtube.com", true), 1_000).await;
        h.drive(BrowserEvent::TabRemoved { tab_id: TabId(1), window_id: WindowId(1) }, 6_000).await;

        let tracking = h.snapshot().await;
        let (_, session) = tracking.domains["youtube.com"].iter().next().unwrap();
        assert_eq!(session.end, Some(6_000));
        assert_eq!(session.end_reason, Some(Reason::TabRemoved));
        let focus = session.focus.values().next().unwrap();
        assert_eq!(focus.end, Some(6_000));
        assert_eq!(h.engine.focused_tab(), None);
    }

    #[tokio::test]
    async fn activation_moves_focus_between_tabs() {
        let h = harness();
        h.drive(created(1, 1, "https://youtube.com", true), 1_000).await;
        h.drive(created(2, 1, "https://twitter.com", false), 2_000).await;
        h.drive(BrowserEvent::TabActivated { tab_id: TabId(2), window_id: WindowId(1) }, 3_000).await;

        let tracking = h.snapshot().await;
        let (_, youtube) = tracking.domains["youtube.com"].iter().next().unwrap();
        let focus = youtube.focus.values().next().unwrap();
        assert_eq!(focus.end, Some(3_000));
        assert_eq!(focus.end_reason, Some(Reason::TabDeactivated));
        assert!(youtube.is_open(), "deactivation must not end the session");

        let (_, twitter) = tracking.domains["twitter.com"].iter().next().unwrap();
        assert!(twitter.has_open_focus());
        assert_eq!(open_focus_count(&tracking), 1);
        assert_eq!(h.engine.focused_tab(), Some((WindowId(1), TabId(2))));
    }

    #[tokio::test]
    async fn activating_a_vanished_tab_is_a_noop() {
        let h = harness();
        // Never applied to the model: the tab closed before the handler ran.
        h.engine
            .handle_at(BrowserEvent::TabActivated { tab_id: TabId(9), window_id: WindowId(1) }, 1_000)
            .await;
        assert!(h.snapshot().await.domains.is_empty());
    }

    #[tokio::test]
    async fn activation_creates_the_missing_session() {
        let h = harness();
        // Tab exists in the browser but was never tracked (e.g. its creation
        // predates the engine).
        h.browser.insert_tab(TabSnapshot {
            id: TabId(5),
            window_id: WindowId(1),
            url: Some("https://example.com".to_string()),
            active: false,
        });
        h.drive(BrowserEvent::TabActivated { tab_id: TabId(5), window_id: WindowId(1) }, 2_000).await;

        let tracking = h.snapshot().await;
        let (_, session) = tracking.domains["example.com"].iter().next().unwrap();
        assert_eq!(session.reason, Reason::TabActivated);
        assert!(session.has_open_focus());
    }

    #[tokio::test]
    async fn window_blur_ends_all_focus_but_no_sessions() {
        let h = harness();
        h.drive(created(1, 1, "https://youtube.com", true), 1_000).await;
        h.drive(created(2, 2, "https://twitter.com", true), 1_000).await;
        h.drive(BrowserEvent::WindowFocusChanged { window_id: None }, 5_000).await;

        let tracking = h.snapshot().await;
        assert_eq!(open_focus_count(&tracking), 0);
        assert_eq!(open_session_count(&tracking), 2);
        for (_, _, session) in tracking.sessions() {
            for focus in session.focus.values() {
                assert_eq!(focus.end_reason, Some(Reason::WindowFocusLost));
            }
        }
        assert_eq!(h.engine.focused_tab(), None);
    }

    #[tokio::test]
    async fn window_focus_gain_moves_focus_to_its_active_tab() {
        let h = harness();
        h.drive(created(1, 1, "https://youtube.com", true), 1_000).await;
        h.drive(created(2, 2, "https://twitter.com", true), 1_000).await;
        // The browser loses OS focus entirely, then window 2 gains it.
        h.drive(BrowserEvent::WindowFocusChanged { window_id: None }, 3_000).await;
        h.drive(BrowserEvent::WindowFocusChanged { window_id: Some(WindowId(2)) }, 4_000).await;

        let tracking = h.snapshot().await;
        assert_eq!(open_focus_count(&tracking), 1, "exactly one focused tab globally");

        let (_, youtube) = tracking.domains["youtube.com"].iter().next().unwrap();
        assert!(!youtube.has_open_focus());

        let (_, twitter) = tracking.domains["twitter.com"].iter().next().unwrap();
        let open = twitter.focus.values().find(|f| f.is_open()).unwrap();
        assert_eq!(open.start, 4_000);
        assert_eq!(open.reason, Reason::WindowFocusGained);
        assert_eq!(h.engine.focused_tab(), Some((WindowId(2), TabId(2))));
    }

    #[tokio::test]
    async fn window_removal_ends_only_its_sessions() {
        let h = harness();
        h.drive(created(1, 1, "https://youtube.com", true), 1_000).await;
        h.drive(created(2, 2, "https://twitter.com", false), 1_000).await;
        h.drive(BrowserEvent::WindowRemoved { window_id: WindowId(1) }, 6_000).await;

        let tracking = h.snapshot().await;
        let (_, gone) = tracking.domains["youtube.com"].iter().next().unwrap();
        assert_eq!(gone.end_reason, Some(Reason::WindowRemoved));
        assert!(!gone.has_open_focus());

        let (_, kept) = tracking.domains["twitter.com"].iter().next().unwrap();
        assert!(kept.is_open());
    }

    #[tokio::test]
    async fn detach_pauses_focus_and_attach_resumes_in_new_window() {
        let h = harness();
        h.drive(created(1, 1, "https://youtube.com", true), 1_000).await;
        h.drive(BrowserEvent::TabDetached { tab_id: TabId(1), old_window_id: WindowId(1) }, 3_000).await;

        let tracking = h.snapshot().await;
        let (id, session) = tracking.domains["youtube.com"].iter().next().unwrap();
        let id = id.clone();
        assert!(session.is_open(), "the session rides through the move");
        let paused = session.focus.values().next().unwrap();
        assert_eq!(paused.end, Some(3_000));
        assert_eq!(paused.end_reason, Some(Reason::TabDetached));

        h.drive(BrowserEvent::TabAttached { tab_id: TabId(1), new_window_id: WindowId(7) }, 4_000).await;

        let tracking = h.snapshot().await;
        let session = tracking.session("youtube.com", &id).unwrap();
        assert_eq!(session.window_id, WindowId(7));
        let resumed = session.focus.values().find(|f| f.is_open()).unwrap();
        assert_eq!(resumed.start, 4_000);
        assert_eq!(resumed.reason, Reason::TabActivated);
        assert_eq!(h.engine.focused_tab(), Some((WindowId(7), TabId(1))));
    }

    #[tokio::test]
    async fn replace_carries_the_session_to_the_new_tab() {
        let h = harness();
        h.drive(created(1, 1, "https://youtube.com", true), 1_000).await;
        h.drive(
            BrowserEvent::TabReplaced { added_tab_id: TabId(8), removed_tab_id: TabId(1) },
            2_000,
        )
        .await;

        let tracking = h.snapshot().await;
        let (_, session) = tracking.domains["youtube.com"].iter().next().unwrap();
        assert!(session.is_open());
        assert_eq!(session.tab_id, TabId(8));
        assert_eq!(session.reason, Reason::TabReplaced);
        assert_eq!(h.engine.focused_tab(), Some((WindowId(1), TabId(8))));

        // The rebound session ends under its new tab id.
        h.drive(BrowserEvent::TabRemoved { tab_id: TabId(8), window_id: WindowId(1) }, 9_000).await;
        let tracking = h.snapshot().await;
        assert_eq!(open_session_count(&tracking), 0);
    }

    #[tokio::test]
    async fn startup_seeds_sessions_and_focus_from_live_tabs() {
        let h = harness();
        let seed = |id: i64, window: i64, url: &str, active: bool| TabSnapshot {
            id: TabId(id),
            window_id: WindowId(window),
            url: Some(url.to_string()),
            active,
        };
        h.browser.insert_tab(seed(1, 1, "https://youtube.com", true));
        h.browser.insert_tab(seed(2, 1, "https://twitter.com", false));
        h.browser.insert_tab(seed(3, 2, "https://example.com", true));
        h.browser.insert_tab(TabSnapshot {
            id: TabId(4),
            window_id: WindowId(2),
            url: Some("chrome://extensions".to_string()),
            active: false,
        });
        h.browser.set_focused_window(Some(WindowId(2)));

        h.drive(BrowserEvent::Startup, 1_000).await;

        let tracking = h.snapshot().await;
        assert_eq!(open_session_count(&tracking), 3, "ineligible tab is not tracked");
        assert_eq!(open_focus_count(&tracking), 1);
        let (_, focused) = tracking.domains["example.com"].iter().next().unwrap();
        assert!(focused.has_open_focus(), "only the focused window's active tab gets focus");
        assert_eq!(h.engine.focused_tab(), Some((WindowId(2), TabId(3))));
    }

    #[tokio::test]
    async fn suspend_leaves_nothing_open() {
        let h = harness();
        h.drive(created(1, 1, "https://youtube.com", true), 1_000).await;
        h.drive(created(2, 2, "https://twitter.com", false), 2_000).await;
        h.drive(BrowserEvent::Suspend, 9_000).await;

        let tracking = h.snapshot().await;
        assert_eq!(open_session_count(&tracking), 0);
        assert_eq!(open_focus_count(&tracking), 0);
        for (_, _, session) in tracking.sessions() {
            assert_eq!(session.end_reason, Some(Reason::Suspend));
            assert_eq!(session.total, Some(session.end.unwrap() - session.start));
        }
        assert_eq!(h.engine.focused_tab(), None);
    }

    #[tokio::test]
    async fn installed_resets_the_store() {
        let h = harness();
        h.drive(created(1, 1, "https://youtube.com", true), 1_000).await;
        h.drive(BrowserEvent::Installed, 2_000).await;
        assert!(h.snapshot().await.domains.is_empty());
    }

    #[tokio::test]
    async fn at_most_one_focus_is_open_across_a_busy_sequence() {
        let h = harness();
        h.drive(created(1, 1, "https://youtube.com", true), 1_000).await;
        h.drive(created(2, 1, "https://twitter.com", true), 2_000).await;
        h.drive(BrowserEvent::TabActivated { tab_id: TabId(1), window_id: WindowId(1) }, 3_000).await;
        h.drive(created(3, 2, "https://example.com", true), 4_000).await;
        h.drive(BrowserEvent::WindowFocusChanged { window_id: Some(WindowId(2)) }, 5_000).await;
        h.drive(BrowserEvent::WindowFocusChanged { window_id: Some(WindowId(1)) }, 6_000).await;

        let tracking = h.snapshot().await;
        assert!(open_focus_count(&tracking) <= 1);
        // No tab has two open sessions either.
        for (domain, id, session) in tracking.sessions() {
            if session.is_open() {
                let (found_domain, found_id) =
                    tracking.find_open(session.window_id, session.tab_id).unwrap();
                assert_eq!((found_domain.as_str(), &found_id), (domain.as_str(), id));
            }
        }
    }
}
