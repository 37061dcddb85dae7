//! Stored cache entries.

use crate::types::{Request, Response};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

/// A response persisted in a [`CacheStore`](super::CacheStore).
///
/// Entries are immutable once written; `validity` is fixed at storage time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub status_code: u16,
    #[serde(default)]
    pub body: Value,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// `None` when missing or unparseable; such entries are always stale.
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub stored_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub validity: Option<Duration>,
    pub source_url: String,
    #[serde(default)]
    pub query_parameters: BTreeMap<String, Value>,
}

impl CacheEntry {
    pub fn new(
        key: impl Into<String>,
        request: &Request,
        response: &Response,
        stored_at: DateTime<Utc>,
        validity: Duration,
    ) -> Self {
        Self {
            key: key.into(),
            status_code: response.status,
            body: response.body.clone(),
            headers: response.headers.clone(),
            stored_at: Some(stored_at),
            validity: Some(validity),
            source_url: request.url.clone(),
            query_parameters: request.query.clone(),
        }
    }

    /// Stale iff `now - stored_at > validity`, or the timestamp is missing.
    pub fn is_stale(&self, now: DateTime<Utc>, default_validity: Duration) -> bool {
        let Some(stored_at) = self.stored_at else {
            return true;
        };
        let validity = self.validity.unwrap_or(default_validity);
        match (now - stored_at).to_std() {
            Ok(age) => age > validity,
            // Stored "in the future" (clock skew): not yet aged.
            Err(_) => false,
        }
    }

    pub fn to_response(&self) -> Response {
        Response {
            status: self.status_code,
            headers: self.headers.clone(),
            body: self.body.clone(),
            from_cache: true,
        }
    }
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw
        .as_ref()
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc)))
}
