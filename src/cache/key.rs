//! Request key generation.

use crate::types::Request;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use url::Url;

/// Canonical identity of a logical request; the store and dedup index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestKey(String);

impl RequestKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for RequestKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RequestKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for RequestKey {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl AsRef<str> for RequestKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Derives `METHOD|url|query|headers?|body`, with every JSON component in
/// canonical (sorted) form so insertion order never changes the key.
#[derive(Debug, Clone, Default)]
pub struct RequestKeyGenerator {
    include_headers: bool,
    hash: bool,
    prefix: Option<String>,
}

impl RequestKeyGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_headers(mut self, include: bool) -> Self {
        self.include_headers = include;
        self
    }

    /// Emit a SHA-256 hex digest of the canonical string instead of the string itself.
    pub fn with_hashing(mut self, hash: bool) -> Self {
        self.hash = hash;
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Key for `request`, memoized onto its options.
    ///
    /// A non-empty key already present on the request (derived earlier or
    /// supplied by the caller) is returned unchanged.
    pub fn key_for(&self, request: &mut Request) -> RequestKey {
        if let Some(existing) = request.request_key() {
            return RequestKey::new(existing);
        }
        let key = self.derive(request);
        request.options.generated_request_key = Some(key.as_str().to_string());
        key
    }

    /// Derive a key without consulting or updating the memoized value.
    pub fn derive(&self, request: &Request) -> RequestKey {
        let (url, url_query) = normalize_url(&request.url);

        // Same pairs, same order as on the wire: the URL's own query first,
        // then the explicit parameters appended after it.
        let mut query: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let explicit = request
            .query_pairs()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v));
        for (name, value) in url_query.into_iter().chain(explicit) {
            query.entry(name).or_default().push(value);
        }
        let query: Map<String, Value> = query
            .into_iter()
            .map(|(name, mut values)| {
                let value = if values.len() == 1 {
                    Value::String(values.remove(0))
                } else {
                    Value::Array(values.into_iter().map(Value::String).collect())
                };
                (name, value)
            })
            .collect();

        let mut parts = vec![
            request.method.trim().to_uppercase(),
            url,
            canonical_json(&Value::Object(query)),
        ];
        if self.include_headers {
            let headers: Map<String, Value> = request
                .headers
                .iter()
                .map(|(k, v)| (k.to_ascii_lowercase(), Value::String(v.clone())))
                .collect();
            parts.push(canonical_json(&Value::Object(headers)));
        }
        parts.push(request.payload().map(canonical_json).unwrap_or_default());

        let canonical = parts.join("|");
        let body = if self.hash {
            let mut hasher = Sha256::new();
            hasher.update(canonical.as_bytes());
            hasher.finalize().iter().map(|b| format!("{:02x}", b)).collect()
        } else {
            canonical
        };
        match &self.prefix {
            Some(p) => RequestKey::new(format!("{}:{}", p, body)),
            None => RequestKey::new(body),
        }
    }
}

/// Split a URL into its normalized base (no query, no fragment) and its
/// query pairs. Relative URLs are kept as written.
fn normalize_url(raw: &str) -> (String, Vec<(String, String)>) {
    let trimmed = raw.trim();
    let without_fragment = trimmed.split('#').next().unwrap_or_default();
    let (base, query) = match without_fragment.split_once('?') {
        Some((base, query)) => (base, Some(query)),
        None => (without_fragment, None),
    };
    let base = match Url::parse(base) {
        Ok(url) => url.to_string(),
        Err(_) => base.to_string(),
    };
    let pairs = query
        .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default();
    (base, pairs)
}

/// Serialize with object keys sorted at every depth.
fn canonical_json(value: &Value) -> String {
    serde_json::to_string(&sorted(value)).unwrap_or_default()
}

fn sorted(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let ordered: BTreeMap<&String, Value> =
                map.iter().map(|(k, v)| (k, sorted(v))).collect();
            Value::Object(ordered.into_iter().map(|(k, v)| (k.clone(), v)).collect())
        }
        Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
        other => other.clone(),
    }
}
