//! Persistent string key/value storage backing the snapshot cache.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};

use crate::types::WeatherError;

/// Minimal key/value store: string keys, string values.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, WeatherError>;
    fn set(&self, key: &str, value: &str) -> Result<(), WeatherError>;
    /// Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), WeatherError>;
}

impl<K: KeyValueStore + ?Sized> KeyValueStore for Arc<K> {
    fn get(&self, key: &str) -> Result<Option<String>, WeatherError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), WeatherError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), WeatherError> {
        (**self).remove(key)
    }
}

/// Process-local store; contents are lost on exit.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, WeatherError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), WeatherError> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), WeatherError> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// SQLite-backed store, one `kv` table.
pub struct SqliteKeyValueStore {
    conn: Mutex<Connection>,
}

fn cache_err(e: rusqlite::Error) -> WeatherError {
    WeatherError::Cache(e.to_string())
}

impl SqliteKeyValueStore {
    /// Open or create the store at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, WeatherError> {
        let conn = Connection::open(path.as_ref()).map_err(cache_err)?;
        Self::init(conn)
    }

    pub fn in_memory() -> Result<Self, WeatherError> {
        Self::init(Connection::open_in_memory().map_err(cache_err)?)
    }

    fn init(conn: Connection) -> Result<Self, WeatherError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )
        .map_err(cache_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl KeyValueStore for SqliteKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, WeatherError> {
        self.conn
            .lock()
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| row.get(0))
            .optional()
            .map_err(cache_err)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), WeatherError> {
        self.conn
            .lock()
            .execute(
                "INSERT INTO kv (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value],
            )
            .map_err(cache_err)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), WeatherError> {
        self.conn
            .lock()
            .execute("DELETE FROM kv WHERE key = ?1", params![key])
            .map_err(cache_err)?;
        Ok(())
    }
}
