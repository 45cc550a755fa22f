//! In-memory cache implementation

use crate::cache::traits::{Cache, CacheError, CacheResult};
use dashmap::DashMap;

/// Process-local page cache backed by a concurrent map
///
/// Useful for tests and for crawls that only need to avoid re-fetching
/// within a single process lifetime.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: DashMap<String, Vec<u8>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns true if the key has an entry
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &str) -> CacheResult<Vec<u8>> {
        self.entries
            .get(key)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| CacheError::NotFound(key.to_string()))
    }

    fn set(&self, key: &str, value: &[u8]) -> CacheResult<()> {
        self.entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> CacheResult<()> {
        self.entries.remove(key);
        Ok(())
    }
}
