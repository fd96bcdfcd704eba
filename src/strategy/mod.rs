//! Rate limiting strategy trait and implementations.
//!
//! Two interchangeable counting algorithms are provided:
//!
//! - **Token Bucket**: lazy-refill counting with burst tolerance up to
//!   the limit. O(1) state per client.
//! - **Sliding Window Log**: exact counting over a rolling interval. One
//!   stored entry per request in the window, no burst allowance.
//!
//! A deployment runs exactly one of them; the closed set is captured by
//! the [`Limiter`] tagged variant the interceptor dispatches through.

mod sliding_window;
mod token_bucket;

pub use sliding_window::SlidingWindowLog;
pub use token_bucket::TokenBucket;

use std::future::Future;

use crate::config::StrategyKind;
use crate::decision::Decision;
use crate::error::Result;
use crate::quota::Quota;
use crate::storage::Storage;

/// Rate limiting strategy trait.
///
/// One `check` call performs one atomic interaction with the storage
/// abstraction and yields a [`Decision`]. Against the shared store the
/// whole decision procedure runs as a single server-side script; against
/// the in-memory store it is composed from primitive operations and
/// relies on that store's single-threaded test usage.
pub trait Strategy: Send + Sync + 'static {
    /// Strategy name (for logging and config round-trips).
    fn name(&self) -> &'static str;

    /// Decide whether a request under `key` fits the quota, recording it
    /// if allowed.
    fn check<S: Storage>(
        &self,
        storage: &S,
        key: &str,
        quota: &Quota,
    ) -> impl Future<Output = Result<Decision>> + Send;

    /// Remove all stored state for a key. Idempotent; safe to retry.
    fn reset<S: Storage>(&self, storage: &S, key: &str) -> impl Future<Output = Result<()>> + Send;
}

/// The closed set of shipped strategies as one dispatchable value.
///
/// The interceptor holds a `Limiter` chosen once at startup from the
/// configured [`StrategyKind`]; switching at runtime is not supported.
#[derive(Debug, Clone)]
pub enum Limiter {
    /// Lazy-refill token bucket.
    TokenBucket(TokenBucket),
    /// Exact sliding window log.
    SlidingWindowLog(SlidingWindowLog),
}

impl Limiter {
    /// Construct the strategy a configuration names.
    pub fn from_kind(kind: StrategyKind) -> Self {
        match kind {
            StrategyKind::TokenBucket => Self::TokenBucket(TokenBucket::new()),
            StrategyKind::SlidingWindow => Self::SlidingWindowLog(SlidingWindowLog::new()),
        }
    }
}

impl Strategy for Limiter {
    fn name(&self) -> &'static str {
        match self {
            Self::TokenBucket(s) => s.name(),
            Self::SlidingWindowLog(s) => s.name(),
        }
    }

    async fn check<S: Storage>(&self, storage: &S, key: &str, quota: &Quota) -> Result<Decision> {
        match self {
            Self::TokenBucket(s) => s.check(storage, key, quota).await,
            Self::SlidingWindowLog(s) => s.check(storage, key, quota).await,
        }
    }

    async fn reset<S: Storage>(&self, storage: &S, key: &str) -> Result<()> {
        match self {
            Self::TokenBucket(s) => s.reset(storage, key).await,
            Self::SlidingWindowLog(s) => s.reset(storage, key).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limiter_from_kind() {
        let limiter = Limiter::from_kind(StrategyKind::TokenBucket);
        assert_eq!(limiter.name(), "token_bucket");

        let limiter = Limiter::from_kind(StrategyKind::SlidingWindow);
        assert_eq!(limiter.name(), "sliding_window");
    }
}
