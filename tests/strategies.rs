//! Integration tests for the counting strategies against the in-memory
//! store.

use std::time::Duration;

use sentinel_ratelimit::storage::now_epoch_secs;
use sentinel_ratelimit::{MemoryStore, Quota, SlidingWindowLog, Strategy, TokenBucket};

#[tokio::test]
async fn test_token_bucket_burst_then_deny() {
    let store = MemoryStore::new();
    let strategy = TokenBucket::new();
    let quota = Quota::new(3, 60);

    for expected_remaining in [2, 1, 0] {
        let decision = strategy.check(&store, "client", &quota).await.unwrap();
        assert!(decision.is_allowed());
        assert_eq!(decision.remaining, expected_remaining);
    }

    let decision = strategy.check(&store, "client", &quota).await.unwrap();
    assert!(decision.is_denied());
    // One token back at 0.05 tokens/s takes ~20s.
    let retry = decision.retry_after.unwrap();
    assert!((19.0..=20.5).contains(&retry), "retry was {retry}");
}

#[tokio::test]
async fn test_token_bucket_partial_refill() {
    let store = MemoryStore::new();
    let strategy = TokenBucket::new();
    let quota = Quota::new(2, 2);

    for _ in 0..2 {
        assert!(
            strategy
                .check(&store, "client", &quota)
                .await
                .unwrap()
                .is_allowed()
        );
    }

    // One token refills per second; after 1.1s exactly one is back.
    tokio::time::sleep(Duration::from_millis(1100)).await;

    let decision = strategy.check(&store, "client", &quota).await.unwrap();
    assert!(decision.is_allowed());

    let decision = strategy.check(&store, "client", &quota).await.unwrap();
    assert!(decision.is_denied());
}

#[tokio::test]
async fn test_sliding_window_exact_enforcement() {
    let store = MemoryStore::new();
    let strategy = SlidingWindowLog::new();
    let quota = Quota::new(5, 60);

    for expected_remaining in [4, 3, 2, 1, 0] {
        let decision = strategy.check(&store, "client", &quota).await.unwrap();
        assert!(decision.is_allowed());
        assert_eq!(decision.remaining, expected_remaining);
    }

    let decision = strategy.check(&store, "client", &quota).await.unwrap();
    assert!(decision.is_denied());
    assert!(decision.retry_after.unwrap() <= 60.0);
}

#[tokio::test]
async fn test_sliding_window_eviction() {
    let store = MemoryStore::new();
    let strategy = SlidingWindowLog::new();
    let quota = Quota::new(2, 1);

    strategy.check(&store, "client", &quota).await.unwrap();
    strategy.check(&store, "client", &quota).await.unwrap();

    tokio::time::sleep(Duration::from_millis(500)).await;
    let decision = strategy.check(&store, "client", &quota).await.unwrap();
    assert!(decision.is_denied());

    // 1.1s after the first two entries they are out of the window.
    tokio::time::sleep(Duration::from_millis(600)).await;
    let decision = strategy.check(&store, "client", &quota).await.unwrap();
    assert!(decision.is_allowed());
}

#[tokio::test]
async fn test_retry_after_decreases_as_window_slides() {
    let store = MemoryStore::new();
    let strategy = SlidingWindowLog::new();
    let quota = Quota::new(1, 3);

    assert!(
        strategy
            .check(&store, "client", &quota)
            .await
            .unwrap()
            .is_allowed()
    );

    let r0 = strategy
        .check(&store, "client", &quota)
        .await
        .unwrap()
        .retry_after
        .unwrap();

    tokio::time::sleep(Duration::from_secs(1)).await;

    let r1 = strategy
        .check(&store, "client", &quota)
        .await
        .unwrap()
        .retry_after
        .unwrap();

    assert!(r1 < r0, "retry_after should shrink: {r1} vs {r0}");
}

#[tokio::test]
async fn test_token_bucket_retry_after_decreases() {
    let store = MemoryStore::new();
    let strategy = TokenBucket::new();
    let quota = Quota::new(1, 3);

    assert!(
        strategy
            .check(&store, "client", &quota)
            .await
            .unwrap()
            .is_allowed()
    );

    let r0 = strategy
        .check(&store, "client", &quota)
        .await
        .unwrap()
        .retry_after
        .unwrap();

    tokio::time::sleep(Duration::from_secs(1)).await;

    let r1 = strategy
        .check(&store, "client", &quota)
        .await
        .unwrap()
        .retry_after
        .unwrap();

    assert!(r1 < r0, "retry_after should shrink: {r1} vs {r0}");
}

#[tokio::test]
async fn test_client_keys_are_independent() {
    let store = MemoryStore::new();
    let strategy = SlidingWindowLog::new();
    let quota = Quota::new(2, 60);

    for _ in 0..2 {
        strategy.check(&store, "client:a", &quota).await.unwrap();
    }
    assert!(
        strategy
            .check(&store, "client:a", &quota)
            .await
            .unwrap()
            .is_denied()
    );

    let decision = strategy.check(&store, "client:b", &quota).await.unwrap();
    assert!(decision.is_allowed());
    assert_eq!(decision.remaining, 1);
}

#[tokio::test]
async fn test_decision_bounds_hold_for_both_strategies() {
    let store = MemoryStore::new();
    let quota = Quota::new(4, 30);

    let token_bucket = TokenBucket::new();
    let sliding_window = SlidingWindowLog::new();

    for _ in 0..8 {
        let before = now_epoch_secs();
        let decision = token_bucket.check(&store, "tb-client", &quota).await.unwrap();
        assert!(decision.remaining <= decision.limit);
        assert!(decision.reset_at > before);
        if decision.is_denied() {
            assert_eq!(decision.remaining, 0);
            assert!(decision.retry_after.unwrap() > 0.0);
        }

        let before = now_epoch_secs();
        let decision = sliding_window
            .check(&store, "sw-client", &quota)
            .await
            .unwrap();
        assert!(decision.remaining <= decision.limit);
        assert!(decision.reset_at > before);
        if decision.is_denied() {
            assert_eq!(decision.remaining, 0);
            assert!(decision.retry_after.unwrap() > 0.0);
        }
    }
}

#[tokio::test]
async fn test_reset_restores_full_quota() {
    let store = MemoryStore::new();
    let quota = Quota::new(3, 60);

    let token_bucket = TokenBucket::new();
    for _ in 0..3 {
        token_bucket.check(&store, "client", &quota).await.unwrap();
    }
    token_bucket.reset(&store, "client").await.unwrap();
    // Reset may be retried freely.
    token_bucket.reset(&store, "client").await.unwrap();

    let decision = token_bucket.check(&store, "client", &quota).await.unwrap();
    assert!(decision.is_allowed());
    assert_eq!(decision.remaining, quota.limit() - 1);

    let sliding_window = SlidingWindowLog::new();
    for _ in 0..3 {
        sliding_window.check(&store, "client", &quota).await.unwrap();
    }
    sliding_window.reset(&store, "client").await.unwrap();

    let decision = sliding_window.check(&store, "client", &quota).await.unwrap();
    assert!(decision.is_allowed());
    assert_eq!(decision.remaining, quota.limit() - 1);
}
