//! Integration tests for the request interceptor.

#![cfg(all(feature = "axum", feature = "memory"))]

use std::net::SocketAddr;

use axum::{
    Router,
    body::Body,
    extract::ConnectInfo,
    http::{Request, StatusCode},
    routing::get,
};
use tower::ServiceExt;

use sentinel_ratelimit::error::{Result, StorageError};
use sentinel_ratelimit::middleware::RateLimitLayer;
use sentinel_ratelimit::storage::{BucketRecord, ScriptArg, ScriptValue};
use sentinel_ratelimit::{
    Limiter, MemoryStore, Quota, QuotaResolver, Storage, StrategyKind, TierTable,
};

async fn handler() -> &'static str {
    "ok"
}

fn app<S: Storage>(storage: S) -> Router {
    let layer = RateLimitLayer::new(
        storage,
        Limiter::from_kind(StrategyKind::TokenBucket),
        QuotaResolver::new(),
    );
    Router::new().route("/", get(handler)).layer(layer)
}

fn request(api_key: Option<&str>, forwarded_for: Option<&str>, peer: &str) -> Request<Body> {
    let mut builder = Request::builder().uri("/");
    if let Some(key) = api_key {
        builder = builder.header("X-API-Key", key);
    }
    if let Some(forwarded) = forwarded_for {
        builder = builder.header("X-Forwarded-For", forwarded);
    }
    let mut request = builder.body(Body::empty()).unwrap();
    let addr: SocketAddr = format!("{peer}:40000").parse().unwrap();
    request.extensions_mut().insert(ConnectInfo(addr));
    request
}

#[tokio::test]
async fn test_api_key_classifies_as_vip() {
    let app = app(MemoryStore::new());

    let response = app
        .oneshot(request(Some("vip_abc"), Some("10.0.0.1"), "127.0.0.1"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["X-User-Tier"], "vip");
    // VIP tier quota from the default table.
    assert_eq!(response.headers()["X-RateLimit-Limit"], "500");
}

#[tokio::test]
async fn test_peer_address_classifies_as_free() {
    let app = app(MemoryStore::new());

    let response = app.oneshot(request(None, None, "10.0.0.2")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["X-User-Tier"], "free");
    assert_eq!(response.headers()["X-RateLimit-Limit"], "5");
}

#[tokio::test]
async fn test_rate_limit_headers_on_allowed_response() {
    let app = app(MemoryStore::new());

    let response = app.oneshot(request(None, None, "10.0.0.3")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("X-RateLimit-Limit"));
    assert!(response.headers().contains_key("X-RateLimit-Remaining"));
    assert!(response.headers().contains_key("X-RateLimit-Reset"));
    assert_eq!(response.headers()["X-RateLimit-Remaining"], "4");
}

#[tokio::test]
async fn test_denial_is_429_with_json_body() {
    let app = app(MemoryStore::new());

    // Free tier allows 5 per minute; the sixth call is denied.
    for _ in 0..5 {
        let response = app
            .clone()
            .oneshot(request(None, None, "10.0.0.4"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app.oneshot(request(None, None, "10.0.0.4")).await.unwrap();

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers()["X-RateLimit-Remaining"], "0");
    assert_eq!(response.headers()["content-type"], "application/json");

    let retry_after: u64 = response.headers()["Retry-After"]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!(retry_after >= 1);

    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"], "rate_limit_exceeded");
    assert_eq!(body["tier"], "free");
    assert!(body["retry_after"].as_f64().unwrap() > 0.0);
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn test_distinct_clients_do_not_share_budget() {
    let app = app(MemoryStore::new());

    for _ in 0..5 {
        app.clone()
            .oneshot(request(None, None, "10.0.0.5"))
            .await
            .unwrap();
    }
    let denied = app
        .clone()
        .oneshot(request(None, None, "10.0.0.5"))
        .await
        .unwrap();
    assert_eq!(denied.status(), StatusCode::TOO_MANY_REQUESTS);

    let other = app.oneshot(request(None, None, "10.0.0.6")).await.unwrap();
    assert_eq!(other.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_custom_tier_table_flows_through() {
    let resolver =
        QuotaResolver::with_table(TierTable::default().with_free(Quota::new(100, 60)));
    let layer = RateLimitLayer::new(
        MemoryStore::new(),
        Limiter::from_kind(StrategyKind::SlidingWindow),
        resolver,
    );
    let app = Router::new().route("/", get(handler)).layer(layer);

    let response = app.oneshot(request(None, None, "10.0.0.7")).await.unwrap();

    assert_eq!(response.headers()["X-RateLimit-Limit"], "100");
    assert_eq!(response.headers()["X-RateLimit-Remaining"], "99");
}

/// Store stub whose every call fails with a transport error.
struct FailingStore;

fn transport_err<T>() -> Result<T> {
    Err(StorageError::operation_failed("connection refused", true).into())
}

impl Storage for FailingStore {
    async fn get(&self, _key: &str) -> Result<Option<BucketRecord>> {
        transport_err()
    }

    async fn set(&self, _key: &str, _record: BucketRecord, _ttl_secs: u64) -> Result<()> {
        transport_err()
    }

    async fn delete(&self, _key: &str) -> Result<()> {
        transport_err()
    }

    async fn zadd(&self, _key: &str, _score: f64, _member: &str) -> Result<()> {
        transport_err()
    }

    async fn zrem_range_by_score(&self, _key: &str, _lo: f64, _hi: f64) -> Result<u64> {
        transport_err()
    }

    async fn zcard(&self, _key: &str) -> Result<u64> {
        transport_err()
    }

    async fn zrange(&self, _key: &str, _start: i64, _stop: i64) -> Result<Vec<String>> {
        transport_err()
    }

    async fn expire(&self, _key: &str, _ttl_secs: u64) -> Result<()> {
        transport_err()
    }

    async fn eval_atomic(
        &self,
        _script: &'static str,
        _keys: &[&str],
        _args: &[ScriptArg],
    ) -> Result<Vec<ScriptValue>> {
        transport_err()
    }
}

#[tokio::test]
async fn test_fail_open_on_storage_outage() {
    let app = app(FailingStore);

    let response = app.oneshot(request(None, None, "10.0.0.8")).await.unwrap();

    // Forwarded unmodified: success status and no rate-limit headers.
    assert_eq!(response.status(), StatusCode::OK);
    assert!(!response.headers().contains_key("X-RateLimit-Limit"));
    assert!(!response.headers().contains_key("X-RateLimit-Remaining"));
    assert!(!response.headers().contains_key("X-User-Tier"));
}

#[tokio::test]
async fn test_missing_strategy_forwards_unmodified() {
    let layer = RateLimitLayer::builder(MemoryStore::new())
        .resolver(QuotaResolver::new())
        .build();
    let app = Router::new().route("/", get(handler)).layer(layer);

    let response = app.oneshot(request(None, None, "10.0.0.9")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(!response.headers().contains_key("X-RateLimit-Limit"));
}
