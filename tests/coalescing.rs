mod common;

use async_trait::async_trait;
use common::{init_tracing, CountingTransport};
use futures::future::join_all;
use http_cache_coalesce::cache::EntryPredicate;
use http_cache_coalesce::{
    CacheConfig, CacheEntry, CacheInterceptor, CacheOptions, CacheStore, CachingClient, Error,
    ErrorContext, Request,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn cache_all_client(transport: Arc<CountingTransport>) -> CachingClient<Arc<CountingTransport>> {
    let interceptor = CacheInterceptor::builder()
        .config(CacheConfig::new().with_cache_all(true))
        .build()
        .unwrap();
    CachingClient::new(transport, Arc::new(interceptor))
}

#[tokio::test]
async fn test_concurrent_identical_requests_share_one_fetch() {
    init_tracing();
    let transport = Arc::new(CountingTransport::new().with_latency(Duration::from_millis(50)));
    let client = cache_all_client(transport.clone());

    let results = join_all((0..10).map(|_| client.execute(Request::get("/users")))).await;

    assert_eq!(transport.calls(), 1);
    for result in results {
        assert_eq!(result.unwrap().body["call"], json!(1));
    }
    let stats = client.interceptor().stats();
    assert_eq!(stats.deduplicated, 9);
    assert_eq!(stats.stores, 1);
    assert_eq!(client.interceptor().pending_requests(), 0);

    // Later callers are served from the store.
    let cached = client.execute(Request::get("/users")).await.unwrap();
    assert!(cached.from_cache);
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn test_query_order_does_not_split_the_group() {
    let transport = Arc::new(CountingTransport::new().with_latency(Duration::from_millis(20)));
    let client = cache_all_client(transport.clone());

    let (a, b, c) = tokio::join!(
        client.execute(Request::get("/search?q=a&page=2")),
        client.execute(Request::get("/search?page=2&q=a")),
        client.execute(Request::get("/search").with_query("q", "a").with_query("page", "2")),
    );
    assert_eq!(transport.calls(), 1);
    assert_eq!(a.unwrap().body, b.unwrap().body);
    assert!(c.is_ok());
}

#[tokio::test]
async fn test_repeated_parameters_are_not_merged_into_one_group() {
    let transport = Arc::new(CountingTransport::new().with_latency(Duration::from_millis(20)));
    let client = cache_all_client(transport.clone());

    let (both, single) = tokio::join!(
        client.execute(Request::get("/items?tag=a&tag=b")),
        client.execute(Request::get("/items?tag=b")),
    );
    assert_eq!(transport.calls(), 2);
    assert_eq!(both.unwrap().body["url"], json!("/items?tag=a&tag=b"));
    assert_eq!(single.unwrap().body["url"], json!("/items?tag=b"));
    assert_eq!(client.interceptor().stats().deduplicated, 0);
}

#[tokio::test]
async fn test_distinct_keys_fetch_independently() {
    let transport = Arc::new(CountingTransport::new().with_latency(Duration::from_millis(20)));
    let client = cache_all_client(transport.clone());

    let (a, b) = tokio::join!(
        client.execute(Request::get("/a")),
        client.execute(Request::get("/b")),
    );
    assert_eq!(transport.calls(), 2);
    assert_eq!(a.unwrap().body["url"], json!("/a"));
    assert_eq!(b.unwrap().body["url"], json!("/b"));
}

#[tokio::test]
async fn test_uncached_requests_are_not_coalesced() {
    let transport = Arc::new(CountingTransport::new().with_latency(Duration::from_millis(20)));
    let interceptor = Arc::new(CacheInterceptor::builder().build().unwrap());
    let client = CachingClient::new(transport.clone(), interceptor);

    join_all((0..3).map(|_| client.execute(Request::get("/live")))).await;
    assert_eq!(transport.calls(), 3);
    assert_eq!(client.interceptor().stats().deduplicated, 0);
}

#[tokio::test]
async fn test_upstream_failure_reaches_every_waiter() {
    let transport = Arc::new(
        CountingTransport::new()
            .with_latency(Duration::from_millis(30))
            .failing(Error::upstream(Some(503), "service unavailable")),
    );
    let client = cache_all_client(transport.clone());

    let results = join_all((0..5).map(|_| client.execute(Request::get("/flaky")))).await;
    assert_eq!(transport.calls(), 1);
    for result in results {
        match result {
            Err(Error::Upstream { status, message }) => {
                assert_eq!(status, Some(503));
                assert_eq!(message, "service unavailable");
            }
            other => panic!("expected shared upstream error, got {:?}", other),
        }
    }

    // Failures are not remembered.
    assert_eq!(client.interceptor().store().len().await.unwrap(), 0);
    assert!(client.execute(Request::get("/flaky")).await.is_err());
    assert_eq!(transport.calls(), 2);
}

#[tokio::test]
async fn test_error_status_shared_but_not_stored() {
    let transport = Arc::new(
        CountingTransport::new()
            .with_latency(Duration::from_millis(20))
            .with_status(500),
    );
    let client = cache_all_client(transport.clone());

    let results = join_all((0..4).map(|_| client.execute(Request::get("/broken")))).await;
    assert_eq!(transport.calls(), 1);
    assert!(results.iter().all(|r| r.as_ref().unwrap().status == 500));
    assert_eq!(client.interceptor().store().len().await.unwrap(), 0);
}

#[tokio::test]
async fn test_invalidating_follower_joins_in_flight_leader() {
    let transport = Arc::new(CountingTransport::new().with_latency(Duration::from_millis(30)));
    let client = cache_all_client(transport.clone());

    let fresh = Request::get("/users").with_options(CacheOptions::new().invalidate());
    let (a, b) = tokio::join!(client.execute(Request::get("/users")), client.execute(fresh));
    assert_eq!(transport.calls(), 1);
    assert_eq!(a.unwrap().body, b.unwrap().body);
}

#[tokio::test]
async fn test_invalidate_always_reaches_network() {
    let transport = Arc::new(CountingTransport::new());
    let client = cache_all_client(transport.clone());

    client.execute(Request::get("/users")).await.unwrap();
    for expected in 2..=4 {
        let resp = client
            .execute(Request::get("/users").with_options(CacheOptions::new().invalidate()))
            .await
            .unwrap();
        assert!(!resp.from_cache);
        assert_eq!(resp.body["call"], json!(expected));
    }
    let cached = client.execute(Request::get("/users")).await.unwrap();
    assert_eq!(cached.body["call"], json!(4));
}

#[tokio::test]
async fn test_cancelled_leader_releases_followers() {
    let transport = Arc::new(CountingTransport::new().with_latency(Duration::from_secs(30)));
    let client = Arc::new(cache_all_client(transport.clone()));

    let leader = {
        let client = client.clone();
        tokio::spawn(async move { client.execute(Request::get("/slow")).await })
    };
    while client.interceptor().pending_requests() == 0 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    let follower = {
        let client = client.clone();
        tokio::spawn(async move { client.execute(Request::get("/slow")).await })
    };
    while client.interceptor().stats().deduplicated == 0 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    leader.abort();
    let outcome = tokio::time::timeout(Duration::from_secs(5), follower)
        .await
        .expect("follower must not hang")
        .unwrap();
    assert!(matches!(outcome, Err(Error::Cancelled { .. })));
    assert_eq!(client.interceptor().pending_requests(), 0);
}

/// Store where every operation fails.
struct OutageStore;

#[async_trait]
impl CacheStore for OutageStore {
    async fn get(&self, _: &str) -> http_cache_coalesce::Result<Option<CacheEntry>> {
        Err(outage())
    }
    async fn set(&self, _: &str, _: CacheEntry) -> http_cache_coalesce::Result<()> {
        Err(outage())
    }
    async fn remove(&self, _: &str) -> http_cache_coalesce::Result<bool> {
        Err(outage())
    }
    async fn remove_matching(&self, _: &EntryPredicate) -> http_cache_coalesce::Result<usize> {
        Err(outage())
    }
    async fn clear(&self) -> http_cache_coalesce::Result<()> {
        Err(outage())
    }
    async fn len(&self) -> http_cache_coalesce::Result<usize> {
        Err(outage())
    }
    fn name(&self) -> &'static str {
        "outage"
    }
}

fn outage() -> Error {
    Error::store_with_context("backend unreachable", ErrorContext::new().with_source("outage_store"))
}

#[tokio::test]
async fn test_store_outage_still_coalesces() {
    let transport = Arc::new(CountingTransport::new().with_latency(Duration::from_millis(20)));
    let interceptor = CacheInterceptor::builder()
        .config(CacheConfig::new().with_cache_all(true))
        .store(Arc::new(OutageStore))
        .build()
        .unwrap();
    let client = CachingClient::new(transport.clone(), Arc::new(interceptor));

    let results = join_all((0..3).map(|_| client.execute(Request::get("/users")))).await;
    assert!(results.iter().all(|r| r.is_ok()));
    assert_eq!(transport.calls(), 1);

    // Nothing could be stored, so the next call goes to the network.
    client.execute(Request::get("/users")).await.unwrap();
    assert_eq!(transport.calls(), 2);
    client.interceptor().clear_all().await;
    assert!(client.interceptor().stats().errors > 0);
}
