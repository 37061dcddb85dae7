//! # http-cache-coalesce
//!
//! 这是一个 HTTP 响应缓存与请求合并引擎，位于 HTTP 客户端的拦截器链中。
//!
//! Response caching and in-flight request coalescing for HTTP clients.
//!
//! ## Overview
//!
//! Requests are identified by a canonical key derived from method, URL,
//! query and body. For every key the engine decides whether caching applies
//! (per-request directive, global cache-all flag, or the first matching
//! conditional rule), serves fresh stored responses without touching the
//! network, and guarantees at most one network call per key is in flight:
//! concurrent identical requests wait for the leader and share its outcome,
//! success or failure.
//!
//! ## Core Philosophy
//!
//! - **Transport-Agnostic**: the engine wraps any [`Transport`]; it never owns the network
//! - **Store-Agnostic**: persistence goes through the [`CacheStore`] trait
//! - **Failure-Tolerant**: store failures degrade to misses and skipped writes
//! - **Deterministic Time**: validity is resolved once, at storage, against an injectable [`Clock`]
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use http_cache_coalesce::policy::{matchers, DurationSource};
//! use http_cache_coalesce::{
//!     CacheInterceptor, CachingClient, ConditionalRule, HttpTransport, Request,
//! };
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> http_cache_coalesce::Result<()> {
//!     let interceptor = CacheInterceptor::builder()
//!         .rule(
//!             ConditionalRule::from_matcher(
//!                 "users",
//!                 matchers::all(vec![matchers::method("GET"), matchers::url_contains("/users")]),
//!             )
//!             .with_duration(DurationSource::fixed(Duration::from_secs(600))),
//!         )
//!         .build()?;
//!
//!     let client = CachingClient::new(
//!         HttpTransport::with_base_url(Some("https://api.example.com"))?,
//!         Arc::new(interceptor),
//!     );
//!
//!     let first = client.execute(Request::get("/users")).await?;
//!     let second = client.execute(Request::get("/users")).await?;
//!     assert!(!first.from_cache && second.from_cache);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`interceptors`] | Request/response/error hooks tying everything together |
//! | [`cache`] | Request keys, cache entries, stores and statistics |
//! | [`policy`] | Caching-applies decision, conditional rules, validity resolution |
//! | [`dedup`] | In-flight request coalescing |
//! | [`transport`] | Network seam and the `reqwest` transport |
//! | [`client`] | Client running the interceptor around a transport |
//! | [`clock`] | Injectable time source |
//! | [`config`] | Interceptor configuration |
//! | [`types`] | Request and response types |

pub mod cache;
pub mod client;
pub mod clock;
pub mod config;
pub mod dedup;
pub mod interceptors;
pub mod policy;
pub mod transport;
pub mod types;

// Re-export main types for convenience
pub use cache::{CacheEntry, CacheStats, CacheStore, MemoryStore, NullStore, RequestKey};
pub use client::CachingClient;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::CacheConfig;
pub use interceptors::{CacheInterceptor, CacheInterceptorBuilder, RequestAction, RequestContext};
pub use policy::{CacheDecision, ConditionalRule, DurationSource};
pub use transport::{HttpTransport, Transport, TransportError};
pub use types::{CacheOptions, Request, Response};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
