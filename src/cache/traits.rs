//! Cache trait and error types
//!
//! This module defines the trait interface for page cache backends and
//! associated error types.

use thiserror::Error;

/// Errors that can occur during cache operations
#[derive(Debug, Error)]
pub enum CacheError {
    /// The key has no cached entry. Callers test for this variant explicitly.
    #[error("Cache entry not found: {0}")]
    NotFound(String),

    #[error("Cache backend error: {0}")]
    Backend(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl CacheError {
    /// Returns true for the "no entry" condition
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Result type for cache operations
pub type CacheResult<T> = Result<T, CacheError>;

/// Trait for page cache implementations
///
/// A cache maps an address string to the raw bytes of the page last fetched
/// from it. Implementations are shared by every crawl worker and must be safe
/// for concurrent use. Expiry and eviction, if any, are the backend's concern.
pub trait Cache: Send + Sync {
    /// Gets the cached bytes for a key
    ///
    /// Returns `CacheError::NotFound` when the key has no entry.
    fn get(&self, key: &str) -> CacheResult<Vec<u8>>;

    /// Stores bytes under a key, replacing any previous entry
    fn set(&self, key: &str, value: &[u8]) -> CacheResult<()>;

    /// Removes the entry for a key; removing a missing key is not an error
    fn delete(&self, key: &str) -> CacheResult<()>;
}
