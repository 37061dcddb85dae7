//! Ready-made request matchers for conditional rules.
//!
//! ```rust
//! use http_cache_coalesce::policy::{matchers, ConditionalRule, DurationSource};
//! use std::time::Duration;
//!
//! let rule = ConditionalRule::from_matcher(
//!     "users",
//!     matchers::all(vec![matchers::method("GET"), matchers::url_contains("/users")]),
//! )
//! .with_duration(DurationSource::fixed(Duration::from_secs(600)));
//! assert_eq!(rule.id(), "users");
//! ```

use super::rules::RequestMatcher;
use crate::types::Request;
use crate::{Error, ErrorContext, Result};
use regex::Regex;
use std::sync::Arc;

/// Case-insensitive method match.
pub fn method(method: &str) -> RequestMatcher {
    let method = method.to_uppercase();
    Arc::new(move |r: &Request| r.method.eq_ignore_ascii_case(&method))
}

pub fn url_contains(fragment: impl Into<String>) -> RequestMatcher {
    let fragment = fragment.into();
    Arc::new(move |r: &Request| r.url.contains(&fragment))
}

pub fn url_regex(pattern: &str) -> Result<RequestMatcher> {
    let re = Regex::new(pattern).map_err(|e| {
        Error::configuration_with_context(
            format!("invalid url pattern: {}", e),
            ErrorContext::new()
                .with_field_path("matchers.url_regex")
                .with_details(pattern.to_string()),
        )
    })?;
    Ok(Arc::new(move |r: &Request| re.is_match(&r.url)))
}

pub fn has_query(name: impl Into<String>) -> RequestMatcher {
    let name = name.into();
    Arc::new(move |r: &Request| r.query.contains_key(&name))
}

pub fn all(matchers: Vec<RequestMatcher>) -> RequestMatcher {
    Arc::new(move |r: &Request| matchers.iter().all(|m| m(r)))
}

pub fn any(matchers: Vec<RequestMatcher>) -> RequestMatcher {
    Arc::new(move |r: &Request| matchers.iter().any(|m| m(r)))
}
