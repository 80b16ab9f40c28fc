//! Cause tags for session and focus transitions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Why a session or focus interval was started or ended.
///
/// Stored on every record (`reason` at creation, `endReason` at close) so the
/// persisted data explains itself. A closed enum rather than free-form strings
/// keeps the transition table exhaustive and compiler-checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reason {
    Startup,
    TabCreated,
    TabUpdated,
    TabActivated,
    TabDeactivated,
    TabRemoved,
    TabDetached,
    TabReplaced,
    DomainChanged,
    WindowFocusGained,
    WindowFocusLost,
    WindowRemoved,
    Suspend,
}

impl Reason {
    /// String representation used in the persisted document.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Startup => "startup",
            Self::TabCreated => "tab_created",
            Self::TabUpdated => "tab_updated",
            Self::TabActivated => "tab_activated",
            Self::TabDeactivated => "tab_deactivated",
            Self::TabRemoved => "tab_removed",
            Self::TabDetached => "tab_detached",
            Self::TabReplaced => "tab_replaced",
            Self::DomainChanged => "domain_changed",
            Self::WindowFocusGained => "window_focus_gained",
            Self::WindowFocusLost => "window_focus_lost",
            Self::WindowRemoved => "window_removed",
            Self::Suspend => "suspend",
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Reason {
    type Err = UnknownReason;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "startup" => Ok(Self::Startup),
            "tab_created" => Ok(Self::TabCreated),
            "tab_updated" => Ok(Self::TabUpdated),
            "tab_activated" => Ok(Self::TabActivated),
            "tab_deactivated" => Ok(Self::TabDeactivated),
            "tab_removed" => Ok(Self::TabRemoved),
            "tab_detached" => Ok(Self::TabDetached),
            "tab_replaced" => Ok(Self::TabReplaced),
            "domain_changed" => Ok(Self::DomainChanged),
            "window_focus_gained" => Ok(Self::WindowFocusGained),
            "window_focus_lost" => Ok(Self::WindowFocusLost),
            "window_removed" => Ok(Self::WindowRemoved),
            "suspend" => Ok(Self::Suspend),
            _ => Err(UnknownReason(s.to_string())),
        }
    }
}

impl Serialize for Reason {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Reason {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Error type for unknown reason strings.
#[derive(Debug, Clone)]
pub struct UnknownReason(String);

impl fmt::Display for UnknownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown reason: {}", self.0)
    }
}

impl std::error::Error for UnknownReason {}
