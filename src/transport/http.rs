use super::{Transport, TransportError};
use crate::types::{Request, Response};
use crate::Result;
use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use std::collections::BTreeMap;
use std::env;
use std::time::Duration;

/// `reqwest`-backed transport.
///
/// Relative request URLs (`/users`) are joined onto the configured base URL.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: Option<String>,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        Self::with_base_url(None::<String>)
    }

    pub fn with_base_url(base_url: Option<impl Into<String>>) -> Result<Self> {
        // Minimal production-friendly defaults (env-overridable).
        let timeout_secs = env::var("HTTP_CACHE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(30);
        let timeout = Duration::from_secs(timeout_secs);

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(
                env::var("HTTP_CACHE_POOL_MAX_IDLE_PER_HOST")
                    .ok()
                    .and_then(|s| s.parse::<usize>().ok())
                    .unwrap_or(32),
            )
            .pool_idle_timeout(Some(Duration::from_secs(90)))
            .build()
            .map_err(TransportError::from)?;

        Ok(Self {
            client,
            base_url: base_url.map(|u| u.into().trim_end_matches('/').to_string()),
            timeout,
        })
    }

    fn resolve_url(&self, url: &str) -> String {
        match &self.base_url {
            Some(base) if url.starts_with('/') => format!("{}{}", base, url),
            _ => url.to_string(),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &Request) -> Result<Response> {
        let method = Method::from_bytes(request.method.to_uppercase().as_bytes())
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
        let url = self.resolve_url(&request.url);

        let mut builder = self.client.request(method, &url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query_pairs());
        }
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = request.payload() {
            builder = builder.json(body);
        }

        let resp = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout(self.timeout)
            } else {
                TransportError::from(e)
            }
        })?;

        let status = resp.status().as_u16();
        let headers: BTreeMap<String, String> = resp
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
            .collect();
        let text = resp.text().await.map_err(TransportError::from)?;
        // Non-JSON payloads are kept verbatim as a string body.
        let body = if text.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };

        tracing::debug!(status, url = %url, "upstream response received");
        Ok(Response {
            status,
            headers,
            body,
            from_cache: false,
        })
    }
}
