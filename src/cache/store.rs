//! Cache store implementations.

use super::entry::CacheEntry;
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use lru::LruCache;
use serde_json::Value;
use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};

/// Predicate over a stored entry's source URL and query parameters.
pub type EntryPredicate = dyn Fn(&str, &BTreeMap<String, Value>) -> bool + Send + Sync;

/// Pluggable persistence for cache entries.
///
/// Every operation may fail; the interceptor treats failures as a miss or
/// a skipped write and never surfaces them to callers.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>>;
    async fn set(&self, key: &str, entry: CacheEntry) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<bool>;
    /// Remove every entry whose `(source_url, query_parameters)` satisfies `predicate`.
    async fn remove_matching(&self, predicate: &EntryPredicate) -> Result<usize>;
    async fn clear(&self) -> Result<()>;
    async fn len(&self) -> Result<usize>;
    fn name(&self) -> &'static str;
}

/// Bounded in-memory store; least recently used entries are evicted first.
pub struct MemoryStore {
    entries: Mutex<LruCache<String, CacheEntry>>,
}

impl MemoryStore {
    pub fn new(max_entries: usize) -> Self {
        let cap = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(cap)),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, LruCache<String, CacheEntry>>> {
        self.entries.lock().map_err(|e| {
            Error::store_with_context(
                format!("memory store lock poisoned: {}", e),
                ErrorContext::new().with_source("memory_store"),
            )
        })
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        Ok(self.lock()?.get(key).cloned())
    }
    async fn set(&self, key: &str, entry: CacheEntry) -> Result<()> {
        self.lock()?.put(key.to_string(), entry);
        Ok(())
    }
    async fn remove(&self, key: &str) -> Result<bool> {
        Ok(self.lock()?.pop(key).is_some())
    }
    async fn remove_matching(&self, predicate: &EntryPredicate) -> Result<usize> {
        let mut entries = self.lock()?;
        let doomed: Vec<String> = entries
            .iter()
            .filter(|(_, e)| predicate(&e.source_url, &e.query_parameters))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &doomed {
            entries.pop(key);
        }
        Ok(doomed.len())
    }
    async fn clear(&self) -> Result<()> {
        self.lock()?.clear();
        Ok(())
    }
    async fn len(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }
    fn name(&self) -> &'static str {
        "memory"
    }
}

pub struct NullStore;
impl NullStore {
    pub fn new() -> Self {
        Self
    }
}
impl Default for NullStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for NullStore {
    async fn get(&self, _: &str) -> Result<Option<CacheEntry>> {
        Ok(None)
    }
    async fn set(&self, _: &str, _: CacheEntry) -> Result<()> {
        Ok(())
    }
    async fn remove(&self, _: &str) -> Result<bool> {
        Ok(false)
    }
    async fn remove_matching(&self, _: &EntryPredicate) -> Result<usize> {
        Ok(0)
    }
    async fn clear(&self) -> Result<()> {
        Ok(())
    }
    async fn len(&self) -> Result<usize> {
        Ok(0)
    }
    fn name(&self) -> &'static str {
        "null"
    }
}
