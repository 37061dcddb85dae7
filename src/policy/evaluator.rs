//! Caching-applies decision and storage-time validity resolution.

use super::rules::{ConditionalRule, RuleRegistry};
use crate::types::Request;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

/// Why caching does or does not apply to a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheDecision {
    Disabled,
    /// `enable_cache == Some(true)` on the request.
    Explicit,
    /// Global cache-all flag.
    CacheAll,
    /// Conditional rule with this id accepted the request.
    Rule(String),
}

impl CacheDecision {
    pub fn applies(&self) -> bool {
        !matches!(self, CacheDecision::Disabled)
    }
}

pub struct CachePolicy {
    rules: Arc<RuleRegistry>,
    cache_all: bool,
    default_validity: Duration,
}

impl CachePolicy {
    pub fn new(rules: Arc<RuleRegistry>, cache_all: bool, default_validity: Duration) -> Self {
        Self {
            rules,
            cache_all,
            default_validity,
        }
    }

    pub fn rules(&self) -> &RuleRegistry {
        &self.rules
    }

    pub fn default_validity(&self) -> Duration {
        self.default_validity
    }

    pub fn decide(&self, request: &Request) -> CacheDecision {
        let opts = &request.options;
        match opts.enable_cache {
            Some(true) => CacheDecision::Explicit,
            Some(false) if opts.override_conditional_cache => CacheDecision::Disabled,
            Some(false) => self.rule_decision(request),
            None if self.cache_all => CacheDecision::CacheAll,
            None => self.rule_decision(request),
        }
    }

    fn rule_decision(&self, request: &Request) -> CacheDecision {
        self.rules
            .first_match(request)
            .map(|rule| CacheDecision::Rule(rule.id().to_string()))
            .unwrap_or(CacheDecision::Disabled)
    }

    /// Resolve the validity window for a response about to be stored.
    ///
    /// Call exactly once, at storage time: relative expiries and user
    /// functions are evaluated against `now`.
    pub fn resolve_validity(&self, request: &Request, now: DateTime<Utc>) -> Duration {
        let opts = &request.options;
        if let Some(d) = opts.cache_validity_duration {
            return d;
        }
        if let Some(d) = opts.validity.resolve(now) {
            return d;
        }
        if let Some(d) = self
            .rules
            .first_match(request)
            .and_then(|rule: Arc<ConditionalRule>| rule.duration().resolve(now))
        {
            return d;
        }
        self.default_validity
    }
}
