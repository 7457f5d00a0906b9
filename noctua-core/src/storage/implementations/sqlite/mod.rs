//! SQLite storage backend
//!
//! `SqliteStore` implements both `UserStore` and `ConversationStore` over
//! one shared connection. Messages live in their own table keyed by
//! `(conversation_id, seq)` so an append is an insert, never a rewrite.

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::storage::traits::{StorageTypes, Stores};

mod conversation;
mod user;

pub(crate) use conversation::init_schema as init_conversation_schema;
pub(crate) use user::init_schema as init_user_schema;

/// Shared SQLite connection
///
/// Create one store and share it via `Arc` across both collections.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open or create a SQLite database at the given path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(&path)
            .with_context(|| format!("Failed to open database {}", path.as_ref().display()))?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory SQLite database (useful for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    pub(crate) fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("sqlite connection lock poisoned"))
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn()?;
        init_user_schema(&conn)?;
        init_conversation_schema(&conn)?;
        Ok(())
    }
}

pub(crate) fn to_sql_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub(crate) fn from_sql_time(value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })
}

pub struct SqliteStorage;

impl StorageTypes for SqliteStorage {
    type User = SqliteStore;
    type Conversation = SqliteStore;
}

#[derive(Clone)]
pub struct SqliteStores {
    store: Arc<SqliteStore>,
}

impl SqliteStores {
    pub fn new(store: SqliteStore) -> Self {
        Self {
            store: Arc::new(store),
        }
    }
}

impl Stores<SqliteStorage> for SqliteStores {
    fn user(&self) -> Arc<SqliteStore> {
        self.store.clone()
    }

    fn conversation(&self) -> Arc<SqliteStore> {
        self.store.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_round_trip_keeps_nanos() {
        let now = Utc::now();
        assert_eq!(from_sql_time(&to_sql_time(&now)).unwrap(), now);
    }

    #[test]
    fn test_open_file_twice() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("noctua.db");
        SqliteStore::open(&path).unwrap();
        SqliteStore::open(&path).unwrap();
    }
}
