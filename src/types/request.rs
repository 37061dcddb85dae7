//! Outgoing request plus the per-request cache directives.

use crate::policy::DurationSource;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

/// Per-request cache directives, attached by the caller before the request
/// is issued.
///
/// The engine treats these as read-only, except for
/// [`generated_request_key`](Self::generated_request_key), which it fills in
/// the first time a key is derived.
#[derive(Debug, Clone, Default)]
pub struct CacheOptions {
    /// `Some(true)` forces caching, `Some(false)` disables it unless a
    /// conditional rule matches, `None` defers to the global policy.
    pub enable_cache: Option<bool>,
    /// Drop any stored entry for this request and go to the network.
    pub invalidate_cache: bool,
    /// With `enable_cache == Some(false)`, also ignore conditional rules.
    pub override_conditional_cache: bool,
    /// A validity window the caller already computed; used as-is.
    pub cache_validity_duration: Option<Duration>,
    /// Per-request validity overrides (expiry fn > expiry > duration fn > duration).
    pub validity: DurationSource,
    /// Memoized request key. A non-empty value set by the caller overrides derivation.
    pub generated_request_key: Option<String>,
}

impl CacheOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enabled(mut self, enable: bool) -> Self {
        self.enable_cache = Some(enable);
        self
    }

    pub fn invalidate(mut self) -> Self {
        self.invalidate_cache = true;
        self
    }

    pub fn override_conditional(mut self) -> Self {
        self.override_conditional_cache = true;
        self
    }

    pub fn with_validity_duration(mut self, d: Duration) -> Self {
        self.cache_validity_duration = Some(d);
        self
    }

    pub fn with_duration(mut self, d: Duration) -> Self {
        self.validity = self.validity.with_duration(d);
        self
    }

    pub fn with_duration_fn<F>(mut self, f: F) -> Self
    where
        F: Fn() -> anyhow::Result<Duration> + Send + Sync + 'static,
    {
        self.validity = self.validity.with_duration_fn(f);
        self
    }

    pub fn with_expiry(mut self, at: DateTime<Utc>) -> Self {
        self.validity = self.validity.with_expiry(at);
        self
    }

    pub fn with_expiry_fn<F>(mut self, f: F) -> Self
    where
        F: Fn() -> anyhow::Result<DateTime<Utc>> + Send + Sync + 'static,
    {
        self.validity = self.validity.with_expiry_fn(f);
        self
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.generated_request_key = Some(key.into());
        self
    }
}

/// A logical HTTP request as seen by the caching layer.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: String,
    pub url: String,
    pub query: BTreeMap<String, Value>,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Value>,
    pub options: CacheOptions,
}

impl Request {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            query: BTreeMap::new(),
            headers: BTreeMap::new(),
            body: None,
            options: CacheOptions::default(),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    pub fn post(url: impl Into<String>, body: Value) -> Self {
        Self::new("POST", url).with_body(body)
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    pub fn with_query_map(mut self, query: BTreeMap<String, Value>) -> Self {
        self.query = query;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_options(mut self, options: CacheOptions) -> Self {
        self.options = options;
        self
    }

    /// The derived key, once [`RequestKeyGenerator::key_for`](crate::cache::RequestKeyGenerator::key_for) has run.
    pub fn request_key(&self) -> Option<&str> {
        self.options
            .generated_request_key
            .as_deref()
            .filter(|k| !k.is_empty())
    }

    /// Explicit query parameters exactly as they are written on the wire:
    /// strings verbatim, any other JSON value in its compact form.
    pub fn query_pairs(&self) -> Vec<(&str, String)> {
        self.query
            .iter()
            .map(|(k, v)| (k.as_str(), query_value(v)))
            .collect()
    }

    /// Body that is actually sent; a JSON `null` counts as no body.
    pub fn payload(&self) -> Option<&Value> {
        self.body.as_ref().filter(|b| !b.is_null())
    }
}

fn query_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
