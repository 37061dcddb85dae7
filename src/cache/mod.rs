//! 响应缓存存储模块：请求键生成、缓存条目与可插拔存储后端。
//!
//! # Response Store Module
//!
//! Everything the interceptor needs to identify a request and persist its
//! response.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`RequestKeyGenerator`] | Canonical, order-independent request keys |
//! | [`CacheEntry`] | Immutable stored response with its validity window |
//! | [`CacheStore`] | Trait for implementing custom stores |
//! | [`MemoryStore`] | In-memory LRU store |
//! | [`NullStore`] | No-op store for disabling persistence |
//! | [`CacheStats`] | Hit/miss/dedup counters |
//!
//! ## Example
//!
//! ```rust
//! use http_cache_coalesce::cache::RequestKeyGenerator;
//! use http_cache_coalesce::Request;
//!
//! let keys = RequestKeyGenerator::new();
//! assert_eq!(
//!     keys.derive(&Request::get("/search?q=a&page=2")),
//!     keys.derive(&Request::get("/search?page=2&q=a")),
//! );
//! ```

mod entry;
mod key;
mod stats;
mod store;

pub use entry::CacheEntry;
pub use key::{RequestKey, RequestKeyGenerator};
pub use stats::CacheStats;
pub(crate) use stats::AtomicStats;
pub use store::{CacheStore, EntryPredicate, MemoryStore, NullStore};
