//! Page cache module
//!
//! The crawler consults a cache before fetching an address and stores every
//! fetched body afterwards. This module provides:
//! - The `Cache` trait and its `NotFound` condition
//! - An in-memory backend for single-process crawls
//! - An SQLite backend whose entries survive restarts

mod memory;
mod schema;
mod sqlite;
mod traits;

pub use memory::MemoryCache;
pub use sqlite::SqliteCache;
pub use traits::{Cache, CacheError, CacheResult};

use std::path::Path;

/// Opens an SQLite-backed cache at the given path
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteCache)` - Successfully opened cache
/// * `Err(CacheError)` - Failed to open the database
pub fn open_cache(path: &Path) -> CacheResult<SqliteCache> {
    SqliteCache::new(path)
}
