//! The external key-value document store.
//!
//! Storage is modeled as an asynchronous get/set service keyed by string
//! names, with no transactional guarantees across calls. Atomicity over the
//! tracking document is layered on top by [`crate::Store`], never assumed
//! from the backend.

use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use rusqlite::{Connection, OptionalExtension, params};
use serde_json::Value;

use crate::StoreError;

/// Asynchronous get/set access to named JSON documents.
pub trait KeyValue: Send + Sync {
    /// Reads the document stored under `key`, if any.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<Value>, StoreError>> + Send;

    /// Writes the document stored under `key`, replacing any previous value.
    fn set(&self, key: &str, value: Value) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// In-memory backend for tests and ephemeral runs.
///
/// Counts every successful `set` so tests can assert that no-op operations
/// perform zero writes.
#[derive(Debug, Default)]
pub struct MemoryKv {
    entries: Mutex<HashMap<String, Value>>,
    writes: AtomicUsize,
}

impl MemoryKv {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `set` calls served so far.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl KeyValue for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let entries = self.entries.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        entries.insert(key.to_string(), value);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// SQLite-backed document store: one `documents` table of JSON values.
///
/// The connection is guarded by a mutex; individual get/set calls remain
/// independent operations with no cross-call transaction, matching the
/// storage service this models.
pub struct SqliteKv {
    conn: Mutex<Connection>,
}

impl SqliteKv {
    /// Opens a document store at the given path, creating it if necessary.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Self::from_connection(Connection::open(path)?)
    }

    /// Opens an in-memory document store. Useful for testing; the data is
    /// destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS documents (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            ",
        )?;
        Ok(Self { conn: Mutex::new(conn) })
    }
}

impl KeyValue for SqliteKv {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let conn = self.conn.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let raw: Option<String> = conn
            .query_row("SELECT value FROM documents WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let raw = serde_json::to_string(&value)?;
        let conn = self.conn.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        conn.execute(
            "
            INSERT INTO documents (key, value) VALUES (?1, ?2)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            ",
            params![key, raw],
        )?;
        Ok(())
    }
}
