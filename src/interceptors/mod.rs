//! 缓存拦截器：把缓存策略、请求合并与存储接入 HTTP 生命周期钩子。
//!
//! # Cache Interceptor
//!
//! [`CacheInterceptor`] plugs into the three lifecycle hooks of an HTTP
//! client's interceptor chain:
//!
//! | Hook | Terminal action |
//! |------|-----------------|
//! | [`on_request`](CacheInterceptor::on_request) | proceed to network, resolve from cache/leader, or reject with the leader's error |
//! | [`on_response`](CacheInterceptor::on_response) | store (unless error-like) and fan out to followers |
//! | [`on_error`](CacheInterceptor::on_error) | fan the error out to followers |
//!
//! The interceptor is an ordinary value owned by whoever wires up the HTTP
//! client; share it with `Arc` and call the rule-management methods on that
//! handle. [`CachingClient`](crate::CachingClient) drives the hooks around a
//! [`Transport`](crate::transport::Transport) for you.
//!
//! Store failures never reach callers: reads degrade to a miss, writes and
//! deletes are skipped. Only upstream failures are visible, and every caller
//! coalesced onto the same key sees the same one.

mod builder;
mod context;

pub use builder::CacheInterceptorBuilder;
pub use context::{RequestAction, RequestContext};

use crate::cache::{AtomicStats, CacheEntry, CacheStats, CacheStore, RequestKey, RequestKeyGenerator};
use crate::clock::Clock;
use crate::config::CacheConfig;
use crate::dedup::{DedupCoordinator, LeaderTicket, Role};
use crate::policy::{CachePolicy, ConditionalRule};
use crate::types::{Request, Response};
use crate::Error;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Decides whether a response counts as an error (and so must not be stored).
pub type ErrorPredicate = Arc<dyn Fn(&Response) -> bool + Send + Sync>;

pub struct CacheInterceptor {
    config: CacheConfig,
    keys: RequestKeyGenerator,
    policy: CachePolicy,
    coordinator: Arc<DedupCoordinator>,
    store: Arc<dyn CacheStore>,
    clock: Arc<dyn Clock>,
    is_error: ErrorPredicate,
    stats: AtomicStats,
}

impl CacheInterceptor {
    pub fn builder() -> CacheInterceptorBuilder {
        CacheInterceptorBuilder::new()
    }

    /// Request hook.
    ///
    /// Followers suspend here until the leader for their key resolves and
    /// never reach the network.
    pub async fn on_request(&self, mut request: Request) -> RequestAction {
        let key = self.keys.key_for(&mut request);
        let invalidate = request.options.invalidate_cache;
        if invalidate {
            self.evict(&key, "invalidated").await;
        }

        let decision = self.policy.decide(&request);
        if !decision.applies() {
            return RequestAction::Proceed(RequestContext::passthrough(request));
        }

        match self.coordinator.join_or_lead(key.as_str()) {
            Role::Follower(follower) => {
                AtomicStats::bump(&self.stats.deduplicated);
                debug!(key = %key, "joined in-flight request");
                match follower.wait().await {
                    Ok(response) => RequestAction::Resolve(response),
                    Err(error) => RequestAction::Reject(error),
                }
            }
            Role::Leader => {
                let ticket = LeaderTicket::new(self.coordinator.clone(), key.as_str());
                if !invalidate {
                    if let Some(entry) = self.lookup(&key).await {
                        let response = entry.to_response();
                        ticket.succeed(response.clone());
                        return RequestAction::Resolve(response);
                    }
                }
                debug!(key = %key, decision = ?decision, "fetching from network");
                RequestAction::Proceed(RequestContext::leader(request, decision, ticket))
            }
        }
    }

    /// Response hook. Returns the response to forward down the chain.
    pub async fn on_response(&self, ctx: RequestContext, response: Response) -> Response {
        let RequestContext {
            request, leader, ..
        } = ctx;
        let Some(ticket) = leader else {
            return response;
        };

        if (self.is_error)(&response) {
            debug!(key = %ticket.key(), status = response.status, "error response, not stored");
        } else {
            self.persist(ticket.key(), &request, &response).await;
        }
        ticket.succeed(response.clone());
        response
    }

    /// Error hook. Returns the error to forward down the chain.
    pub fn on_error(&self, ctx: RequestContext, error: Error) -> Error {
        if let Some(ticket) = ctx.leader {
            debug!(key = %ticket.key(), error = %error, "upstream failed");
            ticket.fail(error.clone());
        }
        error
    }

    /// Register a rule. A duplicate id is ignored and `false` returned.
    pub fn add_rule(&self, rule: ConditionalRule) -> bool {
        let id = rule.id().to_string();
        let added = self.policy.rules().add(rule);
        if added {
            info!(rule = %id, "cache rule added");
        } else {
            debug!(rule = %id, "cache rule already registered, ignoring");
        }
        added
    }

    /// Register a rule, overwriting an existing one with the same id.
    /// Returns `true` if a rule was replaced.
    pub fn add_or_replace_rule(&self, rule: ConditionalRule) -> bool {
        let id = rule.id().to_string();
        let replaced = self.policy.rules().add_or_replace(rule).is_some();
        info!(rule = %id, replaced, "cache rule registered");
        replaced
    }

    /// Unregister a rule; with `cascade_evict`, also drop stored entries
    /// whose source URL and query parameters the rule matches.
    pub async fn remove_rule(&self, id: &str, cascade_evict: bool) -> bool {
        let Some(rule) = self.policy.rules().remove(id) else {
            return false;
        };
        if cascade_evict {
            let predicate = move |url: &str, query: &BTreeMap<String, Value>| {
                rule.matches(&Request::get(url).with_query_map(query.clone()))
            };
            match self.store.remove_matching(&predicate).await {
                Ok(evicted) => {
                    self.stats.evictions.fetch_add(evicted as u64, Ordering::Relaxed);
                    info!(rule = %id, evicted, "cache rule removed with cascading eviction");
                }
                Err(e) => {
                    AtomicStats::bump(&self.stats.errors);
                    warn!(rule = %id, error = %e, "cascading eviction failed");
                }
            }
        } else {
            info!(rule = %id, "cache rule removed");
        }
        true
    }

    /// Wipe the whole store.
    pub async fn clear_all(&self) {
        match self.store.clear().await {
            Ok(()) => info!(store = self.store.name(), "cache cleared"),
            Err(e) => {
                AtomicStats::bump(&self.stats.errors);
                warn!(error = %e, "cache clear failed");
            }
        }
    }

    /// Key under which `request` is stored and coalesced (memoized on the request).
    pub fn key_for(&self, request: &mut Request) -> RequestKey {
        self.keys.key_for(request)
    }

    pub fn rule_ids(&self) -> Vec<String> {
        self.policy.rules().ids()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.to_stats()
    }

    pub fn pending_requests(&self) -> usize {
        self.coordinator.pending_count()
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    async fn lookup(&self, key: &RequestKey) -> Option<CacheEntry> {
        match self.store.get(key.as_str()).await {
            Ok(Some(entry)) => {
                if entry.is_stale(self.clock.now(), self.policy.default_validity()) {
                    AtomicStats::bump(&self.stats.misses);
                    self.evict(key, "stale").await;
                    None
                } else {
                    AtomicStats::bump(&self.stats.hits);
                    debug!(key = %key, "cache hit");
                    Some(entry)
                }
            }
            Ok(None) => {
                AtomicStats::bump(&self.stats.misses);
                None
            }
            Err(e) => {
                AtomicStats::bump(&self.stats.misses);
                AtomicStats::bump(&self.stats.errors);
                warn!(key = %key, error = %e, "cache read failed, treating as miss");
                None
            }
        }
    }

    async fn evict(&self, key: &RequestKey, reason: &'static str) {
        match self.store.remove(key.as_str()).await {
            Ok(true) => {
                AtomicStats::bump(&self.stats.evictions);
                debug!(key = %key, reason, "cache entry removed");
            }
            Ok(false) => {}
            Err(e) => {
                AtomicStats::bump(&self.stats.errors);
                warn!(key = %key, reason, error = %e, "cache delete failed");
            }
        }
    }

    async fn persist(&self, key: &str, request: &Request, response: &Response) {
        // Validity is resolved here, at the storage instant, and never again.
        let now = self.clock.now();
        let validity = self.policy.resolve_validity(request, now);

        let size = serde_json::to_vec(&response.body)
            .map(|b| b.len())
            .unwrap_or(usize::MAX);
        if size > self.config.max_entry_size {
            debug!(key, size, "response too large to cache");
            return;
        }

        let entry = CacheEntry::new(key, request, response, now, validity);
        match self.store.set(key, entry).await {
            Ok(()) => {
                AtomicStats::bump(&self.stats.stores);
                debug!(key, validity_ms = validity.as_millis() as u64, "response cached");
            }
            Err(e) => {
                AtomicStats::bump(&self.stats.errors);
                warn!(key, error = %e, "cache write failed, response not cached");
            }
        }
    }
}
