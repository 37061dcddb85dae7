//! HTTP client with the cache interceptor wired around a transport.
//!
//! Keep the public surface small: one call, [`CachingClient::execute`], that
//! runs the request hook, the transport and the matching response/error hook.

use crate::interceptors::{CacheInterceptor, RequestAction};
use crate::transport::{HttpTransport, Transport};
use crate::types::{Request, Response};
use crate::Result;
use std::sync::Arc;

pub struct CachingClient<T: Transport = HttpTransport> {
    transport: T,
    interceptor: Arc<CacheInterceptor>,
}

impl<T: Transport> CachingClient<T> {
    pub fn new(transport: T, interceptor: Arc<CacheInterceptor>) -> Self {
        Self {
            transport,
            interceptor,
        }
    }

    /// Shared handle for rule management and stats.
    pub fn interceptor(&self) -> &Arc<CacheInterceptor> {
        &self.interceptor
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub async fn execute(&self, request: Request) -> Result<Response> {
        let ctx = match self.interceptor.on_request(request).await {
            RequestAction::Proceed(ctx) => ctx,
            RequestAction::Resolve(response) => return Ok(response),
            RequestAction::Reject(error) => return Err(error),
        };

        match self.transport.send(ctx.request()).await {
            Ok(response) => Ok(self.interceptor.on_response(ctx, response).await),
            Err(error) => Err(self.interceptor.on_error(ctx, error)),
        }
    }
}

impl CachingClient<HttpTransport> {
    /// Client over [`HttpTransport::new`] with a default interceptor.
    pub fn http() -> Result<Self> {
        Ok(Self::new(
            HttpTransport::new()?,
            Arc::new(CacheInterceptor::builder().build()?),
        ))
    }
}

impl<T: Transport> Clone for CachingClient<T>
where
    T: Clone,
{
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            interceptor: self.interceptor.clone(),
        }
    }
}
