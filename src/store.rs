//! # Persistence Store
//!
//! A small namespace → JSON document contract used by the listening
//! history. Two backends ship with the crate:
//!
//! - [`SqliteStore`]: a single `documents` table in a bundled SQLite
//!   database, one row per namespace, upserted on every save.
//! - [`MemoryStore`]: an in-process map for tests and throwaway sessions.
//!
//! Callers treat every store error as non-fatal: they log it and keep
//! their in-memory state.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use log::debug;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;

/// Key-value persistence for whole documents.
pub trait Store: Send + Sync {
    /// Load the document stored under `namespace`, if any.
    fn load(&self, namespace: &str) -> Result<Option<Value>>;

    /// Replace the document stored under `namespace`.
    fn save(&self, namespace: &str, document: &Value) -> Result<()>;
}

/// SQLite-backed store.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and make sure the table exists.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be opened or the schema cannot be created.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open store database at {}", path.display()))?;
        Self::with_connection(conn)
    }

    /// Store backed by a private in-memory SQLite database.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS documents (
                namespace  TEXT    PRIMARY KEY,
                document   TEXT    NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            [],
        )
        .context("Failed to create documents table")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Unix timestamp of the last save to `namespace`.
    pub fn updated_at(&self, namespace: &str) -> Result<Option<i64>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT updated_at FROM documents WHERE namespace = ?1",
            params![namespace],
            |row| row.get(0),
        )
        .optional()
        .with_context(|| format!("Failed to read timestamp for namespace '{namespace}'"))
    }
}

impl Store for SqliteStore {
    fn load(&self, namespace: &str) -> Result<Option<Value>> {
        let conn = self.conn.lock();
        let raw: Option<String> = conn
            .query_row(
                "SELECT document FROM documents WHERE namespace = ?1",
                params![namespace],
                |row| row.get(0),
            )
            .optional()
            .with_context(|| format!("Failed to load namespace '{namespace}'"))?;

        raw.map(|text| {
            serde_json::from_str(&text)
                .with_context(|| format!("Stored document for '{namespace}' is not valid JSON"))
        })
        .transpose()
    }

    fn save(&self, namespace: &str, document: &Value) -> Result<()> {
        let text = serde_json::to_string(document)
            .with_context(|| format!("Failed to serialise document for '{namespace}'"))?;
        let now = chrono::Utc::now().timestamp();

        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO documents (namespace, document, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(namespace) DO UPDATE SET document = excluded.document,
                                                  updated_at = excluded.updated_at",
            params![namespace, text, now],
        )
        .with_context(|| format!("Failed to save namespace '{namespace}'"))?;

        debug!("Saved {} bytes to namespace '{namespace}'", text.len());
        Ok(())
    }
}

/// In-memory store. Can be switched into a failing mode for tests.
#[derive(Default)]
pub struct MemoryStore {
    documents: Mutex<HashMap<String, Value>>,
    failing: Mutex<bool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent load and save fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock() = failing;
    }

    /// Number of namespaces holding a document.
    pub fn len(&self) -> usize {
        self.documents.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.lock().is_empty()
    }
}

impl Store for MemoryStore {
    fn load(&self, namespace: &str) -> Result<Option<Value>> {
        if *self.failing.lock() {
            bail!("memory store is in failing mode (load '{namespace}')");
        }
        Ok(self.documents.lock().get(namespace).cloned())
    }

    fn save(&self, namespace: &str, document: &Value) -> Result<()> {
        if *self.failing.lock() {
            bail!("memory store is in failing mode (save '{namespace}')");
        }
        self.documents
            .lock()
            .insert(namespace.to_string(), document.clone());
        Ok(())
    }
}

impl<S: Store + ?Sized> Store for std::sync::Arc<S> {
    fn load(&self, namespace: &str) -> Result<Option<Value>> {
        (**self).load(namespace)
    }

    fn save(&self, namespace: &str, document: &Value) -> Result<()> {
        (**self).save(namespace, document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_sqlite_round_trip_and_upsert() {
        let dir = TempDir::new().unwrap();
        let store = SqliteStore::open(&dir.path().join("test.db")).unwrap();

        assert!(store.load("history").unwrap().is_none());

        store.save("history", &json!({"a": 1})).unwrap();
        store.save("history", &json!({"a": 2})).unwrap();
        assert_eq!(store.load("history").unwrap(), Some(json!({"a": 2})));
        assert!(store.updated_at("history").unwrap().is_some());
    }

    #[test]
    fn test_sqlite_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("reopen.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.save("ns", &json!([1, 2, 3])).unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.load("ns").unwrap(), Some(json!([1, 2, 3])));
    }

    #[test]
    fn test_memory_store_failing_mode() {
        let store = MemoryStore::new();
        store.save("ns", &json!(true)).unwrap();

        store.set_failing(true);
        assert!(store.load("ns").is_err());
        assert!(store.save("ns", &json!(false)).is_err());

        store.set_failing(false);
        assert_eq!(store.load("ns").unwrap(), Some(json!(true)));
        assert_eq!(store.len(), 1);
    }
}
