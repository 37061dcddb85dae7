//! Shared fixtures for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use http_cache_coalesce::{Error, Request, Response, Transport};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Transport that counts calls and answers after a fixed latency.
///
/// Successful bodies carry the call number, so tests can tell a network
/// answer from a replayed one.
pub struct CountingTransport {
    calls: AtomicUsize,
    latency: Duration,
    status: u16,
    fail_with: Option<Error>,
}

impl CountingTransport {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            latency: Duration::ZERO,
            status: 200,
            fail_with: None,
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn failing(mut self, error: Error) -> Self {
        self.fail_with = Some(error);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for CountingTransport {
    async fn send(&self, request: &Request) -> http_cache_coalesce::Result<Response> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if let Some(err) = &self.fail_with {
            return Err(err.clone());
        }
        Ok(Response::new(
            self.status,
            json!({ "call": n, "url": request.url }),
        ))
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
