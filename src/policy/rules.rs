//! Conditional cache rules and their ordered registry.

use super::duration::DurationSource;
use crate::types::Request;
use arc_swap::ArcSwap;
use std::fmt;
use std::sync::{Arc, Mutex};

pub type RequestMatcher = Arc<dyn Fn(&Request) -> bool + Send + Sync>;

/// A named predicate plus the validity source used for requests it accepts.
#[derive(Clone)]
pub struct ConditionalRule {
    id: String,
    matcher: RequestMatcher,
    duration: DurationSource,
}

impl ConditionalRule {
    /// Rule with an infallible matcher.
    ///
    /// The matcher runs on the request task; a panic inside it is not
    /// caught. Use [`try_new`](Self::try_new) for matchers that can fail.
    pub fn new<F>(id: impl Into<String>, matcher: F) -> Self
    where
        F: Fn(&Request) -> bool + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            matcher: Arc::new(matcher),
            duration: DurationSource::none(),
        }
    }

    /// Rule with a fallible matcher. An `Err` is logged and counts as
    /// "does not match", so evaluation moves on to the next rule.
    pub fn try_new<F>(id: impl Into<String>, matcher: F) -> Self
    where
        F: Fn(&Request) -> anyhow::Result<bool> + Send + Sync + 'static,
    {
        let id = id.into();
        let rule_id = id.clone();
        Self::from_matcher(
            id,
            Arc::new(move |request: &Request| match matcher(request) {
                Ok(matched) => matched,
                Err(e) => {
                    tracing::debug!(rule = %rule_id, error = %e, "rule matcher failed, skipping");
                    false
                }
            }),
        )
    }

    pub fn from_matcher(id: impl Into<String>, matcher: RequestMatcher) -> Self {
        Self {
            id: id.into(),
            matcher,
            duration: DurationSource::none(),
        }
    }

    pub fn with_duration(mut self, duration: DurationSource) -> Self {
        self.duration = duration;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn duration(&self) -> &DurationSource {
        &self.duration
    }

    pub fn matches(&self, request: &Request) -> bool {
        (self.matcher)(request)
    }
}

impl fmt::Debug for ConditionalRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConditionalRule")
            .field("id", &self.id)
            .field("duration", &self.duration)
            .finish_non_exhaustive()
    }
}

/// Insertion-ordered rule registry.
///
/// Readers take a lock-free snapshot; writers are serialized and publish a
/// whole new list, so a reader never observes a half-applied change.
pub struct RuleRegistry {
    rules: ArcSwap<Vec<Arc<ConditionalRule>>>,
    write: Mutex<()>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self {
            rules: ArcSwap::from_pointee(Vec::new()),
            write: Mutex::new(()),
        }
    }

    /// Register a rule. Returns `false` (and changes nothing) if the id is taken.
    pub fn add(&self, rule: ConditionalRule) -> bool {
        let _guard = self.write.lock().unwrap_or_else(|e| e.into_inner());
        let current = self.rules.load();
        if current.iter().any(|r| r.id == rule.id) {
            return false;
        }
        let mut updated: Vec<_> = current.iter().cloned().collect();
        updated.push(Arc::new(rule));
        self.rules.store(Arc::new(updated));
        true
    }

    /// Register a rule, replacing one with the same id in place.
    pub fn add_or_replace(&self, rule: ConditionalRule) -> Option<Arc<ConditionalRule>> {
        let _guard = self.write.lock().unwrap_or_else(|e| e.into_inner());
        let mut updated: Vec<_> = self.rules.load().iter().cloned().collect();
        let rule = Arc::new(rule);
        let previous = match updated.iter().position(|r| r.id == rule.id) {
            Some(idx) => Some(std::mem::replace(&mut updated[idx], rule)),
            None => {
                updated.push(rule);
                None
            }
        };
        self.rules.store(Arc::new(updated));
        previous
    }

    pub fn remove(&self, id: &str) -> Option<Arc<ConditionalRule>> {
        let _guard = self.write.lock().unwrap_or_else(|e| e.into_inner());
        let current = self.rules.load();
        let idx = current.iter().position(|r| r.id == id)?;
        let mut updated: Vec<_> = current.iter().cloned().collect();
        let removed = updated.remove(idx);
        self.rules.store(Arc::new(updated));
        Some(removed)
    }

    /// First rule, in registration order, whose matcher accepts `request`.
    pub fn first_match(&self, request: &Request) -> Option<Arc<ConditionalRule>> {
        self.rules
            .load()
            .iter()
            .find(|r| r.matches(request))
            .cloned()
    }

    pub fn get(&self, id: &str) -> Option<Arc<ConditionalRule>> {
        self.rules.load().iter().find(|r| r.id == id).cloned()
    }

    pub fn ids(&self) -> Vec<String> {
        self.rules.load().iter().map(|r| r.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.rules.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for RuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}
