//! SQLite cache implementation
//!
//! This module provides a SQLite-based implementation of the Cache trait, so
//! page bodies survive between crawler runs.

use crate::cache::schema::initialize_schema;
use crate::cache::traits::{Cache, CacheError, CacheResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// SQLite cache backend
pub struct SqliteCache {
    conn: Mutex<Connection>,
}

impl SqliteCache {
    /// Opens (or creates) a cache database
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteCache)` - Successfully opened/created database
    /// * `Err(CacheError)` - Failed to open database
    pub fn new(path: &Path) -> CacheResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> CacheResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Number of cached pages
    pub fn count(&self) -> CacheResult<u64> {
        let count: i64 = self
            .connection()
            .query_row("SELECT COUNT(*) FROM cached_pages", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// When the entry for a key was last written
    pub fn stored_at(&self, key: &str) -> CacheResult<Option<DateTime<Utc>>> {
        let stored: Option<String> = self
            .connection()
            .query_row(
                "SELECT stored_at FROM cached_pages WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;

        stored
            .map(|s| {
                s.parse::<DateTime<Utc>>()
                    .map_err(|e| CacheError::Backend(format!("Bad timestamp for {}: {}", key, e)))
            })
            .transpose()
    }

    fn connection(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Cache for SqliteCache {
    fn get(&self, key: &str) -> CacheResult<Vec<u8>> {
        let body: Option<Vec<u8>> = self
            .connection()
            .query_row(
                "SELECT body FROM cached_pages WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;

        body.ok_or_else(|| CacheError::NotFound(key.to_string()))
    }

    fn set(&self, key: &str, value: &[u8]) -> CacheResult<()> {
        let now = Utc::now().to_rfc3339();
        self.connection().execute(
            "INSERT INTO cached_pages (key, body, stored_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET body = excluded.body, stored_at = excluded.stored_at",
            params![key, value, now],
        )?;
        Ok(())
    }

    fn delete(&self, key: &str) -> CacheResult<()> {
        self.connection()
            .execute("DELETE FROM cached_pages WHERE key = ?1", params![key])?;
        Ok(())
    }
}
