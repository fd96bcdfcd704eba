//! Distributed HTTP rate limiting for Rust services.
//!
//! `sentinel_ratelimit` enforces per-client request quotas against a
//! shared store so that a horizontally scaled fleet observes a single
//! global budget per client:
//!
//! - **Two Strategies**: Token Bucket (bursty traffic) and Sliding
//!   Window Log (exact enforcement)
//! - **Pluggable Storage**: in-memory for tests and local runs, Redis
//!   with pooling and atomic Lua scripts for production
//! - **Tiered Quotas**: per-client quota resolution from API credentials
//! - **Axum Middleware**: identifies the client, emits the standard
//!   `X-RateLimit-*` headers, short-circuits denials with 429
//!
//! # Quick Start
//!
//! ```ignore
//! use sentinel_ratelimit::{MemoryStore, Quota, SlidingWindowLog, Strategy};
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = MemoryStore::new();
//!     let strategy = SlidingWindowLog::new();
//!     let quota = Quota::per_minute(100);
//!
//!     let decision = strategy.check(&store, "api:abc123", &quota).await.unwrap();
//!
//!     if decision.is_allowed() {
//!         println!("allowed, {} remaining", decision.remaining);
//!     } else {
//!         println!("denied, retry after {:?}s", decision.retry_after);
//!     }
//! }
//! ```
//!
//! # Strategies
//!
//! | Strategy | Enforcement | Memory | Best For |
//! |----------|-------------|--------|----------|
//! | Token Bucket | Average rate, bursts up to the limit | O(1) per client | General API traffic |
//! | Sliding Window Log | Exact count per trailing window | One entry per request | Compliance-sensitive endpoints |
//!
//! # Feature Flags
//!
//! - `memory` (default): in-memory storage
//! - `redis`: Redis storage backend with connection pooling
//! - `axum` (default): Axum/Tower middleware integration

pub mod config;
pub mod decision;
pub mod error;
pub mod headers;
pub mod identity;
pub mod quota;
pub mod storage;
pub mod strategy;

#[cfg(feature = "axum")]
pub mod middleware;

// Re-export main types
pub use config::{Settings, StrategyKind};
pub use decision::{Decision, RateLimitStatus};
pub use error::{ConfigError, ConnectionError, RateLimitError, Result, StorageError};
pub use quota::{Quota, QuotaResolver, TierTable, UserTier};
pub use storage::{BucketRecord, Storage};
pub use strategy::{Limiter, SlidingWindowLog, Strategy, TokenBucket};

#[cfg(feature = "memory")]
pub use storage::MemoryStore;

#[cfg(feature = "redis")]
pub use storage::{RedisConfig, RedisStore};

#[cfg(feature = "axum")]
pub use middleware::RateLimitLayer;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::{Settings, StrategyKind};
    pub use crate::decision::{Decision, RateLimitStatus};
    pub use crate::error::{RateLimitError, Result};
    pub use crate::quota::{Quota, QuotaResolver, TierTable, UserTier};
    pub use crate::storage::Storage;
    pub use crate::strategy::{Limiter, SlidingWindowLog, Strategy, TokenBucket};

    #[cfg(feature = "memory")]
    pub use crate::storage::MemoryStore;

    #[cfg(feature = "redis")]
    pub use crate::storage::{RedisConfig, RedisStore};

    #[cfg(feature = "axum")]
    pub use crate::middleware::RateLimitLayer;
}
