//! Validity-window sources, resolved lazily at storage time.

use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub type DurationFn = Arc<dyn Fn() -> anyhow::Result<Duration> + Send + Sync>;
pub type ExpiryFn = Arc<dyn Fn() -> anyhow::Result<DateTime<Utc>> + Send + Sync>;

/// Where a validity window comes from.
///
/// Any combination of the four sources may be set; [`resolve`](Self::resolve)
/// consults them as expiry fn > expiry > duration fn > duration. An empty
/// source defers to the next tier (ultimately the global default).
#[derive(Clone, Default)]
pub struct DurationSource {
    expiry_fn: Option<ExpiryFn>,
    expiry: Option<DateTime<Utc>>,
    duration_fn: Option<DurationFn>,
    duration: Option<Duration>,
}

impl DurationSource {
    /// Defer to the global default.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn fixed(d: Duration) -> Self {
        Self::default().with_duration(d)
    }

    pub fn computed<F>(f: F) -> Self
    where
        F: Fn() -> anyhow::Result<Duration> + Send + Sync + 'static,
    {
        Self::default().with_duration_fn(f)
    }

    pub fn expires_at(at: DateTime<Utc>) -> Self {
        Self::default().with_expiry(at)
    }

    pub fn computed_expiry<F>(f: F) -> Self
    where
        F: Fn() -> anyhow::Result<DateTime<Utc>> + Send + Sync + 'static,
    {
        Self::default().with_expiry_fn(f)
    }

    pub fn with_duration(mut self, d: Duration) -> Self {
        self.duration = Some(d);
        self
    }

    pub fn with_duration_fn<F>(mut self, f: F) -> Self
    where
        F: Fn() -> anyhow::Result<Duration> + Send + Sync + 'static,
    {
        self.duration_fn = Some(Arc::new(f));
        self
    }

    pub fn with_expiry(mut self, at: DateTime<Utc>) -> Self {
        self.expiry = Some(at);
        self
    }

    pub fn with_expiry_fn<F>(mut self, f: F) -> Self
    where
        F: Fn() -> anyhow::Result<DateTime<Utc>> + Send + Sync + 'static,
    {
        self.expiry_fn = Some(Arc::new(f));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.expiry_fn.is_none()
            && self.expiry.is_none()
            && self.duration_fn.is_none()
            && self.duration.is_none()
    }

    /// Resolve against `now`. Failing user functions are skipped, expiry
    /// instants in the past clamp to zero.
    pub fn resolve(&self, now: DateTime<Utc>) -> Option<Duration> {
        if let Some(f) = &self.expiry_fn {
            match f() {
                Ok(at) => return Some(until(now, at)),
                Err(e) => tracing::debug!(error = %e, "expiry function failed, falling through"),
            }
        }
        if let Some(at) = self.expiry {
            return Some(until(now, at));
        }
        if let Some(f) = &self.duration_fn {
            match f() {
                Ok(d) => return Some(d),
                Err(e) => tracing::debug!(error = %e, "duration function failed, falling through"),
            }
        }
        self.duration
    }
}

fn until(now: DateTime<Utc>, at: DateTime<Utc>) -> Duration {
    (at - now).to_std().unwrap_or(Duration::ZERO)
}

impl fmt::Debug for DurationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DurationSource")
            .field("expiry_fn", &self.expiry_fn.as_ref().map(|_| "<fn>"))
            .field("expiry", &self.expiry)
            .field("duration_fn", &self.duration_fn.as_ref().map(|_| "<fn>"))
            .field("duration", &self.duration)
            .finish()
    }
}
