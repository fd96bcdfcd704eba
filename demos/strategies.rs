//! Drive both strategies directly against the in-memory store and print
//! their decisions side by side.

use sentinel_ratelimit::{MemoryStore, Quota, SlidingWindowLog, Strategy, TokenBucket};

#[tokio::main]
async fn main() {
    let store = MemoryStore::new();
    let quota = Quota::new(3, 60);

    println!("token bucket, limit 3 per 60s:");
    let token_bucket = TokenBucket::new();
    for i in 1..=4 {
        let decision = token_bucket
            .check(&store, "demo-client", &quota)
            .await
            .unwrap();
        match decision.retry_after {
            None => println!("  request {i}: allowed, {} remaining", decision.remaining),
            Some(retry) => println!("  request {i}: denied, retry in {retry:.1}s"),
        }
    }

    println!("sliding window log, limit 3 per 60s:");
    let sliding_window = SlidingWindowLog::new();
    for i in 1..=4 {
        let decision = sliding_window
            .check(&store, "demo-client", &quota)
            .await
            .unwrap();
        match decision.retry_after {
            None => println!("  request {i}: allowed, {} remaining", decision.remaining),
            Some(retry) => println!("  request {i}: denied, retry in {retry:.1}s"),
        }
    }
}
