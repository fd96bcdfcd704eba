//! Micro-benchmarks for the decision path on the in-memory store.

use criterion::{Criterion, criterion_group, criterion_main};
use tokio::runtime::Runtime;

use sentinel_ratelimit::{MemoryStore, Quota, SlidingWindowLog, Strategy, TokenBucket};

fn bench_check(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("check");

    group.bench_function("token_bucket", |b| {
        let store = MemoryStore::new();
        let strategy = TokenBucket::new();
        // Large limit so the hot path stays on the allowed branch.
        let quota = Quota::per_second(1_000_000);
        b.to_async(&rt)
            .iter(|| async { strategy.check(&store, "bench", &quota).await.unwrap() });
    });

    group.bench_function("sliding_window", |b| {
        let store = MemoryStore::new();
        let strategy = SlidingWindowLog::new();
        // Bounded log: after 1000 entries the bench measures the deny path.
        let quota = Quota::new(1000, 60);
        b.to_async(&rt)
            .iter(|| async { strategy.check(&store, "bench", &quota).await.unwrap() });
    });

    group.finish();
}

criterion_group!(benches, bench_check);
criterion_main!(benches);
