//! Durable key-value surface the queue engine persists into.
//!
//! The engine stores each of its lists as one serialized value under a fixed
//! key, so a store only needs whole-value reads and writes.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use super::Database;
use crate::error::VitalSyncError;

/// A persistent, process-surviving key-value store.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<String>, VitalSyncError>;

    /// Replace the value stored under `key`.
    async fn set(&self, key: &str, value: &str) -> Result<(), VitalSyncError>;

    /// Replace several values at once. Either every value is written or none is.
    async fn set_many(&self, entries: &[(&str, &str)]) -> Result<(), VitalSyncError>;

    /// Delete `key`. Deleting a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<(), VitalSyncError>;
}

const UPSERT_VALUE: &str = r"INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)
    ON CONFLICT(key) DO UPDATE SET
    value = excluded.value,
    updated_at = excluded.updated_at";

/// `SQLite`-backed store using the `kv_store` table.
pub struct SqliteStore {
    db: Mutex<Database>,
}

impl SqliteStore {
    /// Wrap an open database.
    #[must_use]
    pub const fn new(db: Database) -> Self {
        Self { db: Mutex::new(db) }
    }

    /// Open the store at a database path, running migrations if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn open_at(path: &std::path::Path) -> Result<Self, VitalSyncError> {
        Ok(Self::new(Database::open_at(path)?))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Database>, VitalSyncError> {
        self.db
            .lock()
            .map_err(|_| VitalSyncError::Storage("Database lock poisoned".to_string()))
    }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<String>, VitalSyncError> {
        let db = self.lock()?;

        db.connection()
            .query_row("SELECT value FROM kv_store WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()
            .map_err(|e| VitalSyncError::Storage(format!("Failed to read key {key}: {e}")))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), VitalSyncError> {
        let db = self.lock()?;

        db.connection()
            .execute(UPSERT_VALUE, params![key, value, Utc::now().to_rfc3339()])
            .map_err(|e| VitalSyncError::Storage(format!("Failed to write key {key}: {e}")))?;

        Ok(())
    }

    async fn set_many(&self, entries: &[(&str, &str)]) -> Result<(), VitalSyncError> {
        let db = self.lock()?;
        let now = Utc::now().to_rfc3339();

        let tx = db
            .connection()
            .unchecked_transaction()
            .map_err(|e| VitalSyncError::Storage(format!("Failed to begin transaction: {e}")))?;

        for (key, value) in entries {
            tx.execute(UPSERT_VALUE, params![key, value, now])
                .map_err(|e| VitalSyncError::Storage(format!("Failed to write key {key}: {e}")))?;
        }

        tx.commit()
            .map_err(|e| VitalSyncError::Storage(format!("Failed to commit transaction: {e}")))
    }

    async fn remove(&self, key: &str) -> Result<(), VitalSyncError> {
        let db = self.lock()?;

        db.connection()
            .execute("DELETE FROM kv_store WHERE key = ?1", [key])
            .map_err(|e| VitalSyncError::Storage(format!("Failed to delete key {key}: {e}")))?;

        Ok(())
    }
}

/// In-memory store for tests and hosts that persist elsewhere.
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
    #[cfg(test)]
    fail_writes: std::sync::atomic::AtomicBool,
    #[cfg(test)]
    fail_key: Mutex<Option<String>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail.
    #[cfg(test)]
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes
            .store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    /// Make subsequent writes to one key fail, or clear that with `None`.
    #[cfg(test)]
    pub fn set_fail_key(&self, key: Option<&str>) {
        if let Ok(mut fail_key) = self.fail_key.lock() {
            *fail_key = key.map(str::to_string);
        }
    }

    #[cfg(test)]
    fn check_writable(&self, key: &str) -> Result<(), VitalSyncError> {
        let key_fails = self
            .fail_key
            .lock()
            .map(|fail_key| fail_key.as_deref() == Some(key))
            .unwrap_or(false);

        if key_fails || self.fail_writes.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(VitalSyncError::Storage(format!("simulated write failure on {key}")));
        }
        Ok(())
    }

    #[cfg(not(test))]
    #[allow(clippy::unnecessary_wraps, clippy::unused_self)]
    const fn check_writable(&self, _key: &str) -> Result<(), VitalSyncError> {
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, String>>, VitalSyncError> {
        self.values
            .lock()
            .map_err(|_| VitalSyncError::Storage("Memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, VitalSyncError> {
        Ok(self.lock()?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), VitalSyncError> {
        self.check_writable(key)?;
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn set_many(&self, entries: &[(&str, &str)]) -> Result<(), VitalSyncError> {
        for (key, _) in entries {
            self.check_writable(key)?;
        }

        let mut values = self.lock()?;
        for (key, value) in entries {
            values.insert((*key).to_string(), (*value).to_string());
        }
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), VitalSyncError> {
        self.check_writable(key)?;
        self.lock()?.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sqlite_get_missing_key() {
        let store = SqliteStore::new(Database::open_in_memory().unwrap());
        assert!(store.get("offline_queue").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sqlite_set_overwrites() {
        let store = SqliteStore::new(Database::open_in_memory().unwrap());

        store.set("offline_queue", "[1]").await.unwrap();
        store.set("offline_queue", "[1,2]").await.unwrap();

        assert_eq!(
            store.get("offline_queue").await.unwrap().as_deref(),
            Some("[1,2]")
        );
    }

    #[tokio::test]
    async fn test_sqlite_remove() {
        let store = SqliteStore::new(Database::open_in_memory().unwrap());

        store.set("sync_history", "[]").await.unwrap();
        store.remove("sync_history").await.unwrap();
        store.remove("sync_history").await.unwrap();

        assert!(store.get("sync_history").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sqlite_survives_reopen() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("queue.db");

        {
            let store = SqliteStore::open_at(&path).unwrap();
            store.set("offline_queue", "[\"a\"]").await.unwrap();
        }

        let store = SqliteStore::open_at(&path).unwrap();
        assert_eq!(
            store.get("offline_queue").await.unwrap().as_deref(),
            Some("[\"a\"]")
        );
    }

    #[tokio::test]
    async fn test_sqlite_set_many_writes_every_key() {
        let store = SqliteStore::new(Database::open_in_memory().unwrap());
        store.set("offline_queue", "[\"a\"]").await.unwrap();

        store
            .set_many(&[("offline_queue", "[]"), ("offline_queue_failed", "[\"a\"]")])
            .await
            .unwrap();

        assert_eq!(store.get("offline_queue").await.unwrap().as_deref(), Some("[]"));
        assert_eq!(
            store.get("offline_queue_failed").await.unwrap().as_deref(),
            Some("[\"a\"]")
        );
    }

    #[tokio::test]
    async fn test_memory_store_set_many_is_all_or_nothing() {
        let store = MemoryStore::new();
        store.set("offline_queue", "[\"a\"]").await.unwrap();

        store.set_fail_key(Some("offline_queue_failed"));
        assert!(matches!(
            store
                .set_many(&[("offline_queue", "[]"), ("offline_queue_failed", "[\"a\"]")])
                .await,
            Err(VitalSyncError::Storage(_))
        ));
        assert_eq!(store.get("offline_queue").await.unwrap().as_deref(), Some("[\"a\"]"));
        assert!(store.get("offline_queue_failed").await.unwrap().is_none());

        store.set_fail_key(None);
        store.set("offline_queue_failed", "[]").await.unwrap();
    }

    #[tokio::test]
    async fn test_memory_store_write_failure() {
        let store = MemoryStore::new();
        store.set("k", "v").await.unwrap();

        store.set_fail_writes(true);
        assert!(matches!(
            store.set("k", "w").await,
            Err(VitalSyncError::Storage(_))
        ));
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
    }
}
