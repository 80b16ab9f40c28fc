//! Serialized access to the tracking document.
//!
//! The external store only offers independent get/set calls, so two handlers
//! that both read-then-write the document can clobber each other. [`Store`]
//! closes that hole: every operation runs as one read-modify-write inside a
//! fair async mutex, so operations apply one at a time in the order they
//! were requested. A failed write surfaces to its own caller only — the
//! next operation re-reads the latest persisted state and proceeds.

use std::collections::HashMap;

use wt_core::url::is_eligible;
use wt_core::{Focus, FocusId, Reason, Session, SessionId, TabId, Tracking, WindowId};

use crate::StoreError;
use crate::kv::KeyValue;

/// Storage key of the tracking document.
const TRACKING_KEY: &str = "raw";

/// Whether a modifier's changes should be persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Persist the modified document.
    Commit,
    /// Discard the modification; nothing is written.
    Skip,
}

/// Secondary in-memory index of open sessions, keyed by `(window, tab)`.
///
/// Rebuilt from the persisted document when stale (construction, or after a
/// failed write) and kept in sync by every mutating operation. Lookups are
/// validated against the document and fall back to a full scan on mismatch,
/// so a stale entry can cost time but never correctness.
#[derive(Debug, Default)]
struct TabIndex {
    open: HashMap<(WindowId, TabId), (String, SessionId)>,
    dirty: bool,
}

impl TabIndex {
    fn rebuild(&mut self, tracking: &Tracking) {
        self.open.clear();
        for (domain, id, session) in tracking.sessions() {
            if session.is_open() {
                self.open
                    .insert((session.window_id, session.tab_id), (domain.clone(), id.clone()));
            }
        }
        self.dirty = false;
    }

    /// Locates the open session for `(window, tab)`, preferring the index.
    fn locate(
        &self,
        tracking: &Tracking,
        window_id: WindowId,
        tab_id: TabId,
    ) -> Option<(String, SessionId)> {
        if let Some((domain, id)) = self.open.get(&(window_id, tab_id)) {
            let valid = tracking.session(domain, id).is_some_and(|s| {
                s.is_open() && s.window_id == window_id && s.tab_id == tab_id
            });
            if valid {
                return Some((domain.clone(), id.clone()));
            }
            tracing::warn!(%window_id, %tab_id, "stale tab index entry, falling back to scan");
        }
        tracking.find_open(window_id, tab_id)
    }
}

/// The serialized store accessor plus every session/focus operation.
///
/// This is the only path by which the tracking document may be read or
/// mutated; going to the backend directly reintroduces the lost-update race.
pub struct Store<S> {
    kv: S,
    index: tokio::sync::Mutex<TabIndex>,
}

impl<S: KeyValue> Store<S> {
    /// Wraps a key-value backend. The tab index is primed lazily on the
    /// first operation.
    pub fn new(kv: S) -> Self {
        Self {
            kv,
            index: tokio::sync::Mutex::new(TabIndex { open: HashMap::new(), dirty: true }),
        }
    }

    /// Returns the backend, consuming the store.
    pub fn into_inner(self) -> S {
        self.kv
    }

    async fn read_tracking(&self) -> Result<Tracking, StoreError> {
        match self.kv.get(TRACKING_KEY).await? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(Tracking::default()),
        }
    }

    /// Runs one serialized read-modify-write cycle.
    ///
    /// The mutex is fair, so cycles run in the order they were requested and
    /// each sees the effects of all earlier ones. On a failed persist the
    /// error goes to this caller alone and the index is marked stale.
    async fn with_state<R>(
        &self,
        f: impl FnOnce(&mut Tracking, &mut TabIndex) -> (Outcome, R),
    ) -> Result<R, StoreError> {
        let mut index = self.index.lock().await;
        let mut tracking = self.read_tracking().await?;
        if index.dirty {
            index.rebuild(&tracking);
        }
        let (outcome, ret) = f(&mut tracking, &mut index);
        if outcome == Outcome::Commit {
            let persisted = match serde_json::to_value(&tracking) {
                Ok(value) => self.kv.set(TRACKING_KEY, value).await,
                Err(err) => Err(err.into()),
            };
            if let Err(err) = persisted {
                index.dirty = true;
                return Err(err);
            }
        }
        Ok(ret)
    }

    /// Runs an arbitrary modifier against the document, serialized against
    /// every other operation. Returning [`Outcome::Skip`] performs no write.
    pub async fn update<R>(
        &self,
        f: impl FnOnce(&mut Tracking) -> (Outcome, R),
    ) -> Result<R, StoreError> {
        self.with_state(|tracking, index| {
            let (outcome, ret) = f(tracking);
            if outcome == Outcome::Commit {
                // An external modifier may have moved sessions under the
                // index's feet; rebuild lazily on the next operation.
                index.dirty = true;
            }
            (outcome, ret)
        })
        .await
    }

    /// Reads a consistent copy of the whole document.
    pub async fn snapshot(&self) -> Result<Tracking, StoreError> {
        self.with_state(|tracking, _| (Outcome::Skip, tracking.clone())).await
    }

    /// Writes an empty document if none exists yet. Returns whether one was
    /// written. Existing data is left untouched, unlike [`Store::reset`].
    pub async fn ensure_initialized(&self) -> Result<bool, StoreError> {
        let _serialized = self.index.lock().await;
        if self.kv.get(TRACKING_KEY).await?.is_some() {
            return Ok(false);
        }
        let empty = serde_json::to_value(Tracking::default())?;
        self.kv.set(TRACKING_KEY, empty).await?;
        Ok(true)
    }

    /// Replaces the document with an empty one (fresh install).
    pub async fn reset(&self) -> Result<(), StoreError> {
        self.with_state(|tracking, index| {
            *tracking = Tracking::default();
            index.open.clear();
            (Outcome::Commit, ())
        })
        .await
    }

    // ===== Session operations =====

    /// Finds the open session for `(window, tab)` under one domain.
    /// `None` if the domain is ineligible or nothing matches.
    pub async fn find_active_session(
        &self,
        domain: &str,
        window_id: WindowId,
        tab_id: TabId,
    ) -> Result<Option<SessionId>, StoreError> {
        if !is_eligible(domain) {
            return Ok(None);
        }
        let domain = domain.to_string();
        self.with_state(move |tracking, _| {
            (Outcome::Skip, tracking.find_open_in_domain(&domain, window_id, tab_id))
        })
        .await
    }

    /// Finds the open session for `(window, tab)` across all domains.
    pub async fn open_session_for_tab(
        &self,
        tab_id: TabId,
        window_id: WindowId,
    ) -> Result<Option<(String, SessionId)>, StoreError> {
        self.with_state(move |tracking, index| {
            (Outcome::Skip, index.locate(tracking, window_id, tab_id))
        })
        .await
    }

    /// Opens a new session for a tab on a domain. No-op (and no write) when
    /// the domain is ineligible.
    pub async fn insert_session(
        &self,
        domain: &str,
        tab_id: TabId,
        window_id: WindowId,
        now: i64,
        reason: Reason,
    ) -> Result<Option<SessionId>, StoreError> {
        if !is_eligible(domain) {
            return Ok(None);
        }
        let domain = domain.to_string();
        self.with_state(move |tracking, index| {
            let id = SessionId::generate();
            tracking.insert_session(&domain, id.clone(), Session::new(now, tab_id, window_id, reason));
            index.open.insert((window_id, tab_id), (domain, id.clone()));
            (Outcome::Commit, Some(id))
        })
        .await
    }

    /// Ends a session (closing its open focus first). Idempotent: returns
    /// false without writing when the domain is ineligible, the session is
    /// absent, or it already ended.
    pub async fn end_session(
        &self,
        domain: &str,
        session_id: &SessionId,
        now: i64,
        reason: Reason,
    ) -> Result<bool, StoreError> {
        if !is_eligible(domain) {
            return Ok(false);
        }
        let domain = domain.to_string();
        let session_id = session_id.clone();
        self.with_state(move |tracking, index| {
            let Some(session) = tracking.session_mut(&domain, &session_id) else {
                return (Outcome::Skip, false);
            };
            if !session.close(now, reason) {
                return (Outcome::Skip, false);
            }
            index.open.remove(&(session.window_id, session.tab_id));
            (Outcome::Commit, true)
        })
        .await
    }

    /// Finds the open session bound to `(tab, window)` and ends it, focus
    /// first. Used after tab removal, when the domain is no longer known.
    /// Returns whether a session was found and ended.
    pub async fn find_and_end_session(
        &self,
        tab_id: TabId,
        window_id: WindowId,
        now: i64,
        reason: Reason,
    ) -> Result<bool, StoreError> {
        self.with_state(move |tracking, index| {
            let Some((domain, id)) = index.locate(tracking, window_id, tab_id) else {
                return (Outcome::Skip, false);
            };
            let Some(session) = tracking.session_mut(&domain, &id) else {
                return (Outcome::Skip, false);
            };
            session.close(now, reason);
            index.open.remove(&(window_id, tab_id));
            (Outcome::Commit, true)
        })
        .await
    }

    /// Ends every open session in one window, each focus first.
    pub async fn end_sessions_in_window(
        &self,
        window_id: WindowId,
        now: i64,
        reason: Reason,
    ) -> Result<(), StoreError> {
        self.with_state(move |tracking, index| {
            let mut changed = false;
            for sessions in tracking.domains.values_mut() {
                for session in sessions.values_mut() {
                    if session.is_open() && session.window_id == window_id {
                        session.close(now, reason);
                        index.open.remove(&(session.window_id, session.tab_id));
                        changed = true;
                    }
                }
            }
            (if changed { Outcome::Commit } else { Outcome::Skip }, ())
        })
        .await
    }

    /// Ends every open session in the store (extension suspend).
    pub async fn end_all_sessions(&self, now: i64, reason: Reason) -> Result<(), StoreError> {
        self.with_state(move |tracking, index| {
            let mut changed = false;
            for sessions in tracking.domains.values_mut() {
                for session in sessions.values_mut() {
                    if session.is_open() {
                        session.close(now, reason);
                        changed = true;
                    }
                }
            }
            index.open.clear();
            (if changed { Outcome::Commit } else { Outcome::Skip }, ())
        })
        .await
    }

    /// Rebinds the open session for a tab to a new window (tab attached
    /// after a detach). Returns the session's domain and id when found.
    pub async fn move_session_to_window(
        &self,
        tab_id: TabId,
        new_window: WindowId,
    ) -> Result<Option<(String, SessionId)>, StoreError> {
        self.with_state(move |tracking, index| {
            let found = tracking
                .sessions()
                .find(|(_, _, s)| s.is_open() && s.tab_id == tab_id)
                .map(|(domain, id, s)| (domain.clone(), id.clone(), s.window_id));
            let Some((domain, id, old_window)) = found else {
                return (Outcome::Skip, None);
            };
            if let Some(session) = tracking.session_mut(&domain, &id) {
                session.window_id = new_window;
            }
            index.open.remove(&(old_window, tab_id));
            index.open.insert((new_window, tab_id), (domain.clone(), id.clone()));
            (Outcome::Commit, Some((domain, id)))
        })
        .await
    }

    /// Rebinds the open session for a replaced tab to its replacement
    /// (prerender/instant-navigation swap). Returns whether one was found.
    pub async fn replace_session_tab(
        &self,
        added_tab: TabId,
        removed_tab: TabId,
    ) -> Result<bool, StoreError> {
        self.with_state(move |tracking, index| {
            let found = tracking
                .sessions()
                .find(|(_, _, s)| s.is_open() && s.tab_id == removed_tab)
                .map(|(domain, id, s)| (domain.clone(), id.clone(), s.window_id));
            let Some((domain, id, window_id)) = found else {
                return (Outcome::Skip, false);
            };
            if let Some(session) = tracking.session_mut(&domain, &id) {
                session.tab_id = added_tab;
                session.reason = Reason::TabReplaced;
            }
            index.open.remove(&(window_id, removed_tab));
            index.open.insert((window_id, added_tab), (domain, id));
            (Outcome::Commit, true)
        })
        .await
    }

    // ===== Focus operations =====

    /// Opens a focus interval inside a session. No-op when the domain is
    /// ineligible, the session does not exist, or the session already has an
    /// open focus (the tab is already focused; the running interval stands).
    pub async fn insert_focus(
        &self,
        domain: &str,
        session_id: &SessionId,
        now: i64,
        reason: Reason,
    ) -> Result<bool, StoreError> {
        if !is_eligible(domain) {
            return Ok(false);
        }
        let domain = domain.to_string();
        let session_id = session_id.clone();
        self.with_state(move |tracking, _| {
            let Some(session) = tracking.session_mut(&domain, &session_id) else {
                return (Outcome::Skip, false);
            };
            if session.has_open_focus() {
                tracing::warn!(%domain, %session_id, "session already has an open focus interval");
                return (Outcome::Skip, false);
            }
            session.focus.insert(FocusId::generate(), Focus::new(now, reason));
            (Outcome::Commit, true)
        })
        .await
    }

    /// Ends the open focus interval of a session, if any. Idempotent.
    pub async fn end_focus(
        &self,
        domain: &str,
        session_id: &SessionId,
        now: i64,
        reason: Reason,
    ) -> Result<bool, StoreError> {
        if !is_eligible(domain) {
            return Ok(false);
        }
        let domain = domain.to_string();
        let session_id = session_id.clone();
        self.with_state(move |tracking, _| {
            let Some(session) = tracking.session_mut(&domain, &session_id) else {
                return (Outcome::Skip, false);
            };
            if session.close_focus(now, reason) {
                (Outcome::Commit, true)
            } else {
                (Outcome::Skip, false)
            }
        })
        .await
    }

    /// Ends open focus on every other tab in a window ("only one focused tab
    /// per window").
    pub async fn end_focus_except_tab(
        &self,
        window_id: WindowId,
        except_tab: TabId,
        now: i64,
        reason: Reason,
    ) -> Result<(), StoreError> {
        self.end_focus_where(now, reason, move |s| {
            s.window_id == window_id && s.tab_id != except_tab
        })
        .await
    }

    /// Ends open focus in every window other than `window_id` ("only one
    /// focused window").
    pub async fn end_focus_outside_window(
        &self,
        window_id: WindowId,
        now: i64,
        reason: Reason,
    ) -> Result<(), StoreError> {
        self.end_focus_where(now, reason, move |s| s.window_id != window_id).await
    }

    /// Ends every open focus in the store (browser lost OS focus, suspend).
    pub async fn end_all_focus(&self, now: i64, reason: Reason) -> Result<(), StoreError> {
        self.end_focus_where(now, reason, |_| true).await
    }

    async fn end_focus_where(
        &self,
        now: i64,
        reason: Reason,
        matches: impl Fn(&Session) -> bool + Send,
    ) -> Result<(), StoreError> {
        self.with_state(move |tracking, _| {
            let mut changed = false;
            for sessions in tracking.domains.values_mut() {
                for session in sessions.values_mut() {
                    if session.is_open() && matches(session) && session.close_focus(now, reason) {
                        changed = true;
                    }
                }
            }
            (if changed { Outcome::Commit } else { Outcome::Skip }, ())
        })
        .await
    }
}
