//! Network collaborator seam.
//!
//! The caching engine never talks to the network itself; it wraps any
//! [`Transport`] and decides around it whether a call is needed at all.

mod http;

pub use http::HttpTransport;

use crate::types::{Request, Response};
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised by a transport while performing the actual network call.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Http(Arc<reqwest::Error>),

    #[error("Request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Transport error: {0}")]
    Other(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        TransportError::Http(Arc::new(err))
    }
}

/// Performs the real network round trip for a request that was not served
/// from the cache.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &Request) -> Result<Response>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send(&self, request: &Request) -> Result<Response> {
        (**self).send(request).await
    }
}
