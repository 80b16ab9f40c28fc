//! Core domain logic for the webtime tracker.
//!
//! This crate contains the fundamental types and logic for:
//! - URL eligibility and domain keying (eTLD+1)
//! - The persisted session/focus interval document
//! - Read-only aggregation over tracked intervals

pub mod id;
mod reason;
mod record;
pub mod report;
mod types;
pub mod url;

pub use reason::{Reason, UnknownReason};
pub use record::{Focus, Session, Tracking};
pub use types::{FocusId, SessionId, TabId, ValidationError, WindowId};
