use crate::dedup::LeaderTicket;
use crate::policy::CacheDecision;
use crate::types::{Request, Response};
use crate::Error;

/// Terminal action chosen by [`CacheInterceptor::on_request`](super::CacheInterceptor::on_request).
#[derive(Debug)]
pub enum RequestAction {
    /// Send the request to the network, then report back through
    /// `on_response` / `on_error` with this context.
    Proceed(RequestContext),
    /// Short-circuit with a cached or shared response.
    Resolve(Response),
    /// Short-circuit with the shared failure of the in-flight leader.
    Reject(Error),
}

/// State carried from `on_request` to `on_response` / `on_error`.
///
/// When this request leads a pending group, dropping the context without
/// reporting an outcome fails the group for every follower.
#[derive(Debug)]
pub struct RequestContext {
    pub(crate) request: Request,
    pub(crate) decision: CacheDecision,
    pub(crate) leader: Option<LeaderTicket>,
}

impl RequestContext {
    pub(crate) fn passthrough(request: Request) -> Self {
        Self {
            request,
            decision: CacheDecision::Disabled,
            leader: None,
        }
    }

    pub(crate) fn leader(request: Request, decision: CacheDecision, ticket: LeaderTicket) -> Self {
        Self {
            request,
            decision,
            leader: Some(ticket),
        }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn decision(&self) -> &CacheDecision {
        &self.decision
    }

    pub fn is_leader(&self) -> bool {
        self.leader.is_some()
    }

    pub fn key(&self) -> Option<&str> {
        self.request.request_key()
    }
}
