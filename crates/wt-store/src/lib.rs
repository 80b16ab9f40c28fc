//! Storage layer for the webtime tracker.
//!
//! The external store is an asynchronous get/set key-value service with no
//! transactional guarantees ([`KeyValue`], with in-memory and SQLite
//! backends). [`Store`] wraps it with a serialized read-modify-write
//! accessor — the only sanctioned path to the tracking document — and
//! provides every session/focus lifecycle operation on top.
//!
//! # Concurrency
//!
//! All tracking logic is event-driven: concurrency comes from interleaved
//! async handlers, not parallelism. Two handlers that each read the document
//! and write back a full copy would lose one of the updates; [`Store`]
//! serializes those cycles in request order so each sees the effects of all
//! earlier ones. Anything that bypasses it is a defect.

mod kv;
mod store;

use thiserror::Error;

pub use kv::{KeyValue, MemoryKv, SqliteKv};
pub use store::{Outcome, Store};

/// Storage errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An error from the SQLite backend.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// The stored document could not be encoded or decoded.
    #[error("document serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    /// A backend-specific failure.
    #[error("storage backend failure: {0}")]
    Backend(String),
}
