//! Cache policy: when to cache, and for how long.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`CachePolicy`] | Caching-applies decision and validity resolution |
//! | [`RuleRegistry`] | Insertion-ordered conditional rules, first match wins |
//! | [`ConditionalRule`] | Named matcher plus [`DurationSource`] |
//! | [`matchers`] | Ready-made request matchers |

mod duration;
mod evaluator;
pub mod matchers;
mod rules;

pub use duration::{DurationFn, DurationSource, ExpiryFn};
pub use evaluator::{CacheDecision, CachePolicy};
pub use rules::{ConditionalRule, RequestMatcher, RuleRegistry};
