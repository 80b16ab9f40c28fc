//! The persisted tracking document: domains, sessions, focus intervals.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::reason::Reason;
use crate::types::{FocusId, SessionId, TabId, WindowId};

/// One continuous interval during which a session's tab was the focused tab
/// in the focused window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Focus {
    /// Epoch milliseconds at which focus began.
    pub start: i64,
    /// Epoch milliseconds at which focus ended; absent while focused.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<i64>,
    /// `end - start`, present only once ended.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<i64>,
    pub reason: Reason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_reason: Option<Reason>,
}

impl Focus {
    /// Creates an open focus interval.
    #[must_use]
    pub const fn new(start: i64, reason: Reason) -> Self {
        Self {
            start,
            end: None,
            total: None,
            reason,
            end_reason: None,
        }
    }

    /// True while the interval has not ended.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.end.is_none()
    }

    /// Closes the interval. Returns false (and changes nothing) if it was
    /// already closed.
    pub fn close(&mut self, now: i64, reason: Reason) -> bool {
        if self.end.is_some() {
            return false;
        }
        self.end = Some(now);
        self.total = Some(now - self.start);
        self.end_reason = Some(reason);
        true
    }
}

/// One continuous interval during which a tab displaying a domain existed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub start: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<i64>,
    /// Tab bound to this session. Rewritten in place on tab replacement.
    pub tab_id: TabId,
    /// Window bound to this session. Rewritten in place on detach/attach.
    pub window_id: WindowId,
    pub reason: Reason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_reason: Option<Reason>,
    /// Focus intervals nested in this session, keyed by focus id. At most one
    /// entry is open at any time.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub focus: BTreeMap<FocusId, Focus>,
}

impl Session {
    /// Creates an open session bound to a tab and window.
    #[must_use]
    pub const fn new(start: i64, tab_id: TabId, window_id: WindowId, reason: Reason) -> Self {
        Self {
            start,
            end: None,
            total: None,
            tab_id,
            window_id,
            reason,
            end_reason: None,
            focus: BTreeMap::new(),
        }
    }

    /// True while the session has not ended.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.end.is_none()
    }

    /// Returns the open focus interval, if any.
    ///
    /// More than one open entry violates the focus invariant; the extras are
    /// reported and the first (by id) wins.
    pub fn open_focus_mut(&mut self) -> Option<&mut Focus> {
        let open = self.focus.values().filter(|f| f.is_open()).count();
        if open > 1 {
            tracing::warn!(open, "session has multiple open focus intervals");
        }
        self.focus.values_mut().find(|f| f.is_open())
    }

    /// True if any focus interval in this session is open.
    #[must_use]
    pub fn has_open_focus(&self) -> bool {
        self.focus.values().any(Focus::is_open)
    }

    /// Closes the open focus interval, if any. Returns whether one was closed.
    pub fn close_focus(&mut self, now: i64, reason: Reason) -> bool {
        self.open_focus_mut().is_some_and(|f| f.close(now, reason))
    }

    /// Closes the session, first closing any open focus with the same reason
    /// (focus never outlives its parent session). Returns false if the
    /// session was already closed.
    pub fn close(&mut self, now: i64, reason: Reason) -> bool {
        if self.end.is_some() {
            return false;
        }
        self.close_focus(now, reason);
        self.end = Some(now);
        self.total = Some(now - self.start);
        self.end_reason = Some(reason);
        true
    }
}

/// The whole persisted tracking document: domain → session id → session.
///
/// Insertion order within a domain's map carries no meaning; sessions are
/// identified solely by id.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tracking {
    pub domains: BTreeMap<String, BTreeMap<SessionId, Session>>,
}

impl Tracking {
    #[must_use]
    pub fn session(&self, domain: &str, id: &SessionId) -> Option<&Session> {
        self.domains.get(domain)?.get(id)
    }

    pub fn session_mut(&mut self, domain: &str, id: &SessionId) -> Option<&mut Session> {
        self.domains.get_mut(domain)?.get_mut(id)
    }

    /// Adds a session under a domain, creating the domain entry if needed.
    pub fn insert_session(&mut self, domain: &str, id: SessionId, session: Session) {
        self.domains.entry(domain.to_string()).or_default().insert(id, session);
    }

    /// Finds the open session bound to `(window_id, tab_id)` across all
    /// domains, returning its domain and id.
    ///
    /// Ids may be reused by the browser after a tab closes, so only sessions
    /// without `end` match. More than one match is an invariant violation:
    /// it is reported and the first match wins.
    #[must_use]
    pub fn find_open(&self, window_id: WindowId, tab_id: TabId) -> Option<(String, SessionId)> {
        let mut found: Option<(String, SessionId)> = None;
        for (domain, sessions) in &self.domains {
            for (id, session) in sessions {
                if session.is_open() && session.window_id == window_id && session.tab_id == tab_id {
                    if found.is_some() {
                        tracing::warn!(%window_id, %tab_id, %domain, %id, "multiple open sessions for one tab");
                    } else {
                        found = Some((domain.clone(), id.clone()));
                    }
                }
            }
        }
        found
    }

    /// Finds the open session for `(window_id, tab_id)` within one domain.
    #[must_use]
    pub fn find_open_in_domain(
        &self,
        domain: &str,
        window_id: WindowId,
        tab_id: TabId,
    ) -> Option<SessionId> {
        let sessions = self.domains.get(domain)?;
        sessions
            .iter()
            .find(|(_, s)| s.is_open() && s.window_id == window_id && s.tab_id == tab_id)
            .map(|(id, _)| id.clone())
    }

    /// Iterates every `(domain, id, session)` triple.
    pub fn sessions(&self) -> impl Iterator<Item = (&String, &SessionId, &Session)> {
        self.domains
            .iter()
            .flat_map(|(domain, sessions)| sessions.iter().map(move |(id, s)| (domain, id, s)))
    }
}
