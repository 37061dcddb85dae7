mod common;

use common::CountingTransport;
use http_cache_coalesce::policy::{matchers, DurationSource};
use http_cache_coalesce::{
    CacheConfig, CacheInterceptor, CacheOptions, CachingClient, Clock, ConditionalRule, ManualClock,
    Request,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const MINUTE: Duration = Duration::from_secs(60);

struct Fixture {
    clock: Arc<ManualClock>,
    transport: Arc<CountingTransport>,
    client: CachingClient<Arc<CountingTransport>>,
}

impl Fixture {
    fn new(config: CacheConfig, rules: Vec<ConditionalRule>) -> Self {
        let clock = Arc::new(ManualClock::starting_now());
        let transport = Arc::new(CountingTransport::new());
        let interceptor = CacheInterceptor::builder()
            .config(config)
            .clock(clock.clone())
            .rules(rules)
            .build()
            .unwrap();
        let client = CachingClient::new(transport.clone(), Arc::new(interceptor));
        Self {
            clock,
            transport,
            client,
        }
    }

    async fn call(&self, request: Request) -> u64 {
        let resp = self.client.execute(request).await.unwrap();
        resp.body["call"].as_u64().unwrap()
    }
}

fn users_rule() -> ConditionalRule {
    ConditionalRule::from_matcher(
        "users",
        matchers::all(vec![matchers::method("GET"), matchers::url_contains("/users")]),
    )
    .with_duration(DurationSource::fixed(10 * MINUTE))
}

#[tokio::test]
async fn test_rule_validity_window() {
    let fx = Fixture::new(CacheConfig::new(), vec![users_rule()]);

    assert_eq!(fx.call(Request::get("/users")).await, 1);
    fx.clock.advance(5 * MINUTE);
    assert_eq!(fx.call(Request::get("/users")).await, 1);
    fx.clock.advance(6 * MINUTE);
    assert_eq!(fx.call(Request::get("/users")).await, 2);
    assert_eq!(fx.transport.calls(), 2);

    // POST is outside the rule.
    fx.call(Request::post("/users", json!({"name": "ada"}))).await;
    fx.call(Request::post("/users", json!({"name": "ada"}))).await;
    assert_eq!(fx.transport.calls(), 4);
}

#[tokio::test]
async fn test_default_validity_applies_without_any_source() {
    let fx = Fixture::new(
        CacheConfig::new()
            .with_cache_all(true)
            .with_default_validity(2 * MINUTE),
        vec![],
    );
    fx.call(Request::get("/items")).await;
    fx.clock.advance(2 * MINUTE);
    assert_eq!(fx.call(Request::get("/items")).await, 1);
    fx.clock.advance(Duration::from_secs(1));
    assert_eq!(fx.call(Request::get("/items")).await, 2);
}

#[tokio::test]
async fn test_request_duration_beats_rule_duration() {
    let fx = Fixture::new(CacheConfig::new(), vec![users_rule()]);
    let short = || Request::get("/users").with_options(CacheOptions::new().with_duration(MINUTE));

    fx.call(short()).await;
    fx.clock.advance(2 * MINUTE);
    assert_eq!(fx.call(short()).await, 2);
}

#[tokio::test]
async fn test_absolute_expiry_resolved_at_storage() {
    let fx = Fixture::new(CacheConfig::new().with_cache_all(true), vec![]);
    let deadline = fx.clock.now() + chrono::Duration::minutes(3);
    let req = move || Request::get("/report").with_options(CacheOptions::new().with_expiry(deadline));

    fx.call(req()).await;
    fx.clock.advance(2 * MINUTE);
    assert_eq!(fx.call(req()).await, 1);
    fx.clock.advance(2 * MINUTE);
    // Re-stored past the deadline: zero validity.
    assert_eq!(fx.call(req()).await, 2);
    fx.clock.advance(Duration::from_millis(1));
    assert_eq!(fx.call(req()).await, 3);
}

#[tokio::test]
async fn test_failing_duration_fn_falls_through() {
    let fx = Fixture::new(CacheConfig::new(), vec![users_rule()]);
    let req = || {
        Request::get("/users").with_options(
            CacheOptions::new().with_duration_fn(|| Err(anyhow::anyhow!("config service down"))),
        )
    };
    fx.call(req()).await;
    // Falls back to the rule's 10 minutes.
    fx.clock.advance(9 * MINUTE);
    assert_eq!(fx.call(req()).await, 1);
    fx.clock.advance(2 * MINUTE);
    assert_eq!(fx.call(req()).await, 2);
}

#[tokio::test]
async fn test_stored_validity_is_not_recomputed() {
    let fx = Fixture::new(CacheConfig::new(), vec![users_rule()]);
    fx.call(Request::get("/users")).await;

    // A shorter replacement rule affects new entries only.
    fx.client.interceptor().add_or_replace_rule(
        ConditionalRule::from_matcher("users", matchers::url_contains("/users"))
            .with_duration(DurationSource::fixed(MINUTE)),
    );
    fx.clock.advance(5 * MINUTE);
    assert_eq!(fx.call(Request::get("/users")).await, 1);
}

#[tokio::test]
async fn test_disable_with_override_bypasses_rules() {
    let fx = Fixture::new(CacheConfig::new().with_cache_all(true), vec![users_rule()]);
    let off = || {
        Request::get("/users")
            .with_options(CacheOptions::new().enabled(false).override_conditional())
    };
    fx.call(off()).await;
    fx.call(off()).await;
    assert_eq!(fx.transport.calls(), 2);

    // Without the override a matching rule still applies.
    let soft_off = || Request::get("/users").with_options(CacheOptions::new().enabled(false));
    fx.call(soft_off()).await;
    assert_eq!(fx.call(soft_off()).await, 3);
}

#[tokio::test]
async fn test_explicit_key_override_shares_entry() {
    let fx = Fixture::new(CacheConfig::new().with_cache_all(true), vec![]);
    let keyed = |url: &str| Request::get(url).with_options(CacheOptions::new().with_key("dashboard"));
    fx.call(keyed("/dashboard?v=1")).await;
    assert_eq!(fx.call(keyed("/dashboard?v=2")).await, 1);
}
