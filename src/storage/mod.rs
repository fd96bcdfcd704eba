//! Storage backend trait and implementations.
//!
//! This module defines the `Storage` trait that all backends must
//! implement, along with the built-in in-memory store and the Redis
//! adapter. The trait covers two families of operations: key-value
//! records with TTL (token bucket state) and ordered-score collections
//! (sliding window log state), plus atomic server-side script execution
//! for backends that support it.

mod record;

#[cfg(feature = "memory")]
mod memory;
#[cfg(feature = "redis")]
mod redis;

pub use record::BucketRecord;

#[cfg(feature = "memory")]
pub use memory::MemoryStore;

#[cfg(feature = "redis")]
pub use redis::{RedisConfig, RedisStore};

use std::future::Future;

use crate::error::Result;

/// Argument passed to an atomic server-side script.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptArg {
    /// Integer argument.
    Int(i64),
    /// Floating-point argument.
    Float(f64),
    /// String argument.
    Str(String),
}

/// Value returned from an atomic server-side script.
///
/// Scripts return fractional numbers as strings because the script
/// runtime truncates numeric replies to integers.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptValue {
    /// Integer reply element.
    Int(i64),
    /// Bulk-string reply element.
    Data(String),
}

impl ScriptValue {
    /// Interpret the element as an integer.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            Self::Data(s) => s.parse().ok(),
        }
    }

    /// Interpret the element as a float.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Int(n) => Some(*n as f64),
            Self::Data(s) => s.parse().ok(),
        }
    }
}

/// Storage backend trait for rate limiting state.
///
/// All operations are async to admit both local and distributed
/// backends, and all may fail with a transport error that is surfaced to
/// the caller unchanged. Implementations must honour TTL at read time: a
/// `get` on an expired key returns `None`, and every ordered-score
/// operation behaves as on an empty collection.
pub trait Storage: Send + Sync + 'static {
    /// Get the record stored at `key`.
    ///
    /// Returns `None` if the key doesn't exist or has expired.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<BucketRecord>>> + Send;

    /// Replace the record at `key` and set its TTL in the same atomic step.
    fn set(
        &self,
        key: &str,
        record: BucketRecord,
        ttl_secs: u64,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Delete a key. Succeeds even if the key didn't exist.
    fn delete(&self, key: &str) -> impl Future<Output = Result<()>> + Send;

    /// Add `member` to the ordered collection at `key` with `score`.
    ///
    /// If the member already exists its score is updated.
    fn zadd(&self, key: &str, score: f64, member: &str)
    -> impl Future<Output = Result<()>> + Send;

    /// Remove members whose score lies in `[lo, hi]` (inclusive bounds).
    ///
    /// Returns the number of members removed.
    fn zrem_range_by_score(
        &self,
        key: &str,
        lo: f64,
        hi: f64,
    ) -> impl Future<Output = Result<u64>> + Send;

    /// Count members in the ordered collection at `key`.
    fn zcard(&self, key: &str) -> impl Future<Output = Result<u64>> + Send;

    /// Get members by index range, ascending by score.
    ///
    /// 0-based with an inclusive `stop`; negative indices count from the
    /// end, as in the Redis convention.
    fn zrange(
        &self,
        key: &str,
        start: i64,
        stop: i64,
    ) -> impl Future<Output = Result<Vec<String>>> + Send;

    /// Set a TTL on `key`. No-op if the key is absent.
    fn expire(&self, key: &str, ttl_secs: u64) -> impl Future<Output = Result<()>> + Send;

    /// Execute a server-side script atomically.
    ///
    /// Backends that cannot run scripts return
    /// [`StorageError::ScriptsUnsupported`](crate::error::StorageError::ScriptsUnsupported);
    /// strategies probe [`Storage::supports_atomic_scripts`] first.
    fn eval_atomic(
        &self,
        script: &'static str,
        keys: &[&str],
        args: &[ScriptArg],
    ) -> impl Future<Output = Result<Vec<ScriptValue>>> + Send;

    /// Whether this backend executes [`Storage::eval_atomic`] as a single
    /// linearised operation.
    fn supports_atomic_scripts(&self) -> bool {
        false
    }
}

impl<S: Storage + ?Sized> Storage for std::sync::Arc<S> {
    async fn get(&self, key: &str) -> Result<Option<BucketRecord>> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, record: BucketRecord, ttl_secs: u64) -> Result<()> {
        (**self).set(key, record, ttl_secs).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        (**self).delete(key).await
    }

    async fn zadd(&self, key: &str, score: f64, member: &str) -> Result<()> {
        (**self).zadd(key, score, member).await
    }

    async fn zrem_range_by_score(&self, key: &str, lo: f64, hi: f64) -> Result<u64> {
        (**self).zrem_range_by_score(key, lo, hi).await
    }

    async fn zcard(&self, key: &str) -> Result<u64> {
        (**self).zcard(key).await
    }

    async fn zrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>> {
        (**self).zrange(key, start, stop).await
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> Result<()> {
        (**self).expire(key, ttl_secs).await
    }

    async fn eval_atomic(
        &self,
        script: &'static str,
        keys: &[&str],
        args: &[ScriptArg],
    ) -> Result<Vec<ScriptValue>> {
        (**self).eval_atomic(script, keys, args).await
    }

    fn supports_atomic_scripts(&self) -> bool {
        (**self).supports_atomic_scripts()
    }
}

impl<S: Storage + ?Sized> Storage for Box<S> {
    async fn get(&self, key: &str) -> Result<Option<BucketRecord>> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, record: BucketRecord, ttl_secs: u64) -> Result<()> {
        (**self).set(key, record, ttl_secs).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        (**self).delete(key).await
    }

    async fn zadd(&self, key: &str, score: f64, member: &str) -> Result<()> {
        (**self).zadd(key, score, member).await
    }

    async fn zrem_range_by_score(&self, key: &str, lo: f64, hi: f64) -> Result<u64> {
        (**self).zrem_range_by_score(key, lo, hi).await
    }

    async fn zcard(&self, key: &str) -> Result<u64> {
        (**self).zcard(key).await
    }

    async fn zrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>> {
        (**self).zrange(key, start, stop).await
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> Result<()> {
        (**self).expire(key, ttl_secs).await
    }

    async fn eval_atomic(
        &self,
        script: &'static str,
        keys: &[&str],
        args: &[ScriptArg],
    ) -> Result<Vec<ScriptValue>> {
        (**self).eval_atomic(script, keys, args).await
    }

    fn supports_atomic_scripts(&self) -> bool {
        (**self).supports_atomic_scripts()
    }
}

/// Current time as fractional seconds since the Unix epoch.
pub fn now_epoch_secs() -> f64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_value_as_int() {
        assert_eq!(ScriptValue::Int(3).as_int(), Some(3));
        assert_eq!(ScriptValue::Data("42".into()).as_int(), Some(42));
        assert_eq!(ScriptValue::Data("nope".into()).as_int(), None);
    }

    #[test]
    fn test_script_value_as_float() {
        assert_eq!(ScriptValue::Int(3).as_float(), Some(3.0));
        assert_eq!(ScriptValue::Data("0.25".into()).as_float(), Some(0.25));
    }

    #[test]
    fn test_now_epoch_secs_is_sane() {
        // After 2020-01-01 and before 2100-01-01.
        let now = now_epoch_secs();
        assert!(now > 1_577_836_800.0);
        assert!(now < 4_102_444_800.0);
    }
}
