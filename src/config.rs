//! Interceptor configuration.

use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Validity used when neither the request nor a matching rule provides one.
    pub default_validity: Duration,
    /// Cache every request that carries no explicit `enable_cache` directive.
    pub cache_all: bool,
    pub include_headers_in_key: bool,
    /// Store under SHA-256 digests of the canonical key.
    pub hash_keys: bool,
    pub key_prefix: Option<String>,
    /// Responses whose serialized body exceeds this many bytes are not stored.
    pub max_entry_size: usize,
    /// Capacity of the default in-memory store.
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_validity: Duration::from_secs(3600),
            cache_all: false,
            include_headers_in_key: false,
            hash_keys: false,
            key_prefix: None,
            max_entry_size: 10 * 1024 * 1024,
            max_entries: 1000,
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden from the environment:
    /// - `HTTP_CACHE_DEFAULT_VALIDITY_SECS`
    /// - `HTTP_CACHE_ALL` (`1` or `true`)
    /// - `HTTP_CACHE_KEY_PREFIX`
    /// - `HTTP_CACHE_MAX_ENTRY_SIZE` (bytes)
    /// - `HTTP_CACHE_MAX_ENTRIES`
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Some(secs) = env_parse::<u64>("HTTP_CACHE_DEFAULT_VALIDITY_SECS") {
            cfg.default_validity = Duration::from_secs(secs);
        }
        if let Ok(v) = env::var("HTTP_CACHE_ALL") {
            cfg.cache_all = matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true");
        }
        if let Ok(prefix) = env::var("HTTP_CACHE_KEY_PREFIX") {
            if !prefix.is_empty() {
                cfg.key_prefix = Some(prefix);
            }
        }
        if let Some(size) = env_parse::<usize>("HTTP_CACHE_MAX_ENTRY_SIZE") {
            cfg.max_entry_size = size;
        }
        if let Some(n) = env_parse::<usize>("HTTP_CACHE_MAX_ENTRIES") {
            cfg.max_entries = n;
        }
        cfg
    }

    pub fn with_default_validity(mut self, d: Duration) -> Self {
        self.default_validity = d;
        self
    }

    pub fn with_cache_all(mut self, all: bool) -> Self {
        self.cache_all = all;
        self
    }

    pub fn with_headers_in_key(mut self, include: bool) -> Self {
        self.include_headers_in_key = include;
        self
    }

    pub fn with_hashed_keys(mut self, hash: bool) -> Self {
        self.hash_keys = hash;
        self
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }

    pub fn with_max_entry_size(mut self, bytes: usize) -> Self {
        self.max_entry_size = bytes;
        self
    }

    pub fn with_max_entries(mut self, n: usize) -> Self {
        self.max_entries = n;
        self
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|s| s.trim().parse::<T>().ok())
}
