use super::{CacheInterceptor, ErrorPredicate};
use crate::cache::{AtomicStats, CacheStore, MemoryStore, RequestKeyGenerator};
use crate::clock::{Clock, SystemClock};
use crate::config::CacheConfig;
use crate::dedup::DedupCoordinator;
use crate::policy::{CachePolicy, ConditionalRule, RuleRegistry};
use crate::types::Response;
use crate::{Error, ErrorContext, Result};
use std::sync::Arc;

/// Builder for [`CacheInterceptor`].
///
/// Keep this surface area small and predictable; everything has a default.
pub struct CacheInterceptorBuilder {
    config: CacheConfig,
    store: Option<Arc<dyn CacheStore>>,
    clock: Arc<dyn Clock>,
    rules: Vec<ConditionalRule>,
    is_error: Option<ErrorPredicate>,
}

impl CacheInterceptorBuilder {
    pub fn new() -> Self {
        Self {
            config: CacheConfig::default(),
            store: None,
            clock: Arc::new(SystemClock),
            rules: Vec::new(),
            is_error: None,
        }
    }

    pub fn config(mut self, config: CacheConfig) -> Self {
        self.config = config;
        self
    }

    /// Use a custom store. Default is a [`MemoryStore`] sized by `config.max_entries`.
    pub fn store(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Register a rule at construction. Constructor rules and rules added
    /// later share one registration order.
    pub fn rule(mut self, rule: ConditionalRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rules(mut self, rules: impl IntoIterator<Item = ConditionalRule>) -> Self {
        self.rules.extend(rules);
        self
    }

    /// Responses for which `f` returns true are propagated but never stored.
    /// Default: any status outside 200..=299.
    pub fn is_error<F>(mut self, f: F) -> Self
    where
        F: Fn(&Response) -> bool + Send + Sync + 'static,
    {
        self.is_error = Some(Arc::new(f));
        self
    }

    pub fn build(self) -> Result<CacheInterceptor> {
        if self.config.max_entry_size == 0 {
            return Err(Error::configuration_with_context(
                "max_entry_size must be greater than zero",
                ErrorContext::new()
                    .with_field_path("config.max_entry_size")
                    .with_source("interceptor_builder"),
            ));
        }
        if self.store.is_none() && self.config.max_entries == 0 {
            return Err(Error::configuration_with_context(
                "max_entries must be greater than zero for the default memory store",
                ErrorContext::new()
                    .with_field_path("config.max_entries")
                    .with_source("interceptor_builder"),
            ));
        }

        let registry = Arc::new(RuleRegistry::new());
        for rule in self.rules {
            let id = rule.id().to_string();
            if !registry.add(rule) {
                tracing::warn!(rule = %id, "duplicate rule id at construction, keeping the first");
            }
        }

        let mut keys = RequestKeyGenerator::new()
            .with_headers(self.config.include_headers_in_key)
            .with_hashing(self.config.hash_keys);
        if let Some(prefix) = &self.config.key_prefix {
            keys = keys.with_prefix(prefix.clone());
        }

        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new(self.config.max_entries)) as Arc<dyn CacheStore>);
        let policy = CachePolicy::new(
            registry,
            self.config.cache_all,
            self.config.default_validity,
        );

        tracing::info!(
            store = store.name(),
            cache_all = self.config.cache_all,
            rules = policy.rules().len(),
            "cache interceptor ready"
        );

        Ok(CacheInterceptor {
            config: self.config,
            keys,
            policy,
            coordinator: Arc::new(DedupCoordinator::new()),
            store,
            clock: self.clock,
            is_error: self
                .is_error
                .unwrap_or_else(|| Arc::new(|r: &Response| !r.is_success()) as ErrorPredicate),
            stats: AtomicStats::default(),
        })
    }
}

impl Default for CacheInterceptorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
