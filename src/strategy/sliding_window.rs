//! Sliding Window Log rate limiting strategy.
//!
//! Stores one entry per request in an ordered-score collection and
//! evicts entries older than the window before every decision. Memory
//! grows with traffic, but the limit is enforced exactly with no burst
//! allowance; suited to endpoints where averaging is unacceptable.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::decision::Decision;
use crate::error::Result;
use crate::quota::Quota;
use crate::storage::{ScriptArg, Storage, now_epoch_secs};
use crate::strategy::Strategy;

/// Key prefix for sliding window state.
const KEY_PREFIX: &str = "sw:";

/// Process-wide disambiguator so near-simultaneous requests never
/// collapse into one log entry through the score-update semantics of
/// `zadd`.
static NEXT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Atomic decision procedure, executed server-side against the shared
/// store. Scores come from the store's own clock; the member is supplied
/// by the caller and unique per request.
const CHECK_SCRIPT: &str = r#"
local key = KEYS[1]
local limit = tonumber(ARGV[1])
local window = tonumber(ARGV[2])
local member = ARGV[3]

local time = redis.call('TIME')
local now = tonumber(time[1]) + tonumber(time[2]) / 1000000
local window_start = now - window

redis.call('ZREMRANGEBYSCORE', key, '-inf', window_start)
local count = redis.call('ZCARD', key)

if count < limit then
    redis.call('ZADD', key, now, member)
    redis.call('EXPIRE', key, window)
    return {1, limit - count - 1, tostring(now), '0'}
end

local oldest = redis.call('ZRANGE', key, 0, 0, 'WITHSCORES')
local retry = 0.1
if oldest[2] then
    retry = math.max(0.1, tonumber(oldest[2]) + window - now)
end
return {0, 0, tostring(now), tostring(retry)}
"#;

/// Sliding Window Log strategy.
#[derive(Debug, Clone, Copy, Default)]
pub struct SlidingWindowLog;

impl SlidingWindowLog {
    /// Create a new Sliding Window Log strategy instance.
    pub fn new() -> Self {
        Self
    }

    fn storage_key(key: &str) -> String {
        format!("{KEY_PREFIX}{key}")
    }

    /// Build a member unique within sub-second resolution: nanosecond
    /// timestamp plus a monotone counter.
    fn unique_member() -> String {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let seq = NEXT_SEQ.fetch_add(1, Ordering::Relaxed);
        format!("{nanos}-{seq}")
    }

    /// Recover the request timestamp a member was minted at.
    fn member_epoch_secs(member: &str) -> Option<f64> {
        let nanos: u128 = member.split('-').next()?.parse().ok()?;
        Some(nanos as f64 / 1e9)
    }

    async fn check_scripted<S: Storage>(
        &self,
        storage: &S,
        key: &str,
        quota: &Quota,
    ) -> Result<Decision> {
        let member = Self::unique_member();
        let reply = storage
            .eval_atomic(
                CHECK_SCRIPT,
                &[&Self::storage_key(key)],
                &[
                    ScriptArg::Int(quota.limit() as i64),
                    ScriptArg::Int(quota.window_secs() as i64),
                    ScriptArg::Str(member),
                ],
            )
            .await?;

        let allowed = reply.first().and_then(|v| v.as_int()).unwrap_or(0) == 1;
        let remaining = reply.get(1).and_then(|v| v.as_int()).unwrap_or(0).max(0) as u64;
        let now = reply
            .get(2)
            .and_then(|v| v.as_float())
            .unwrap_or_else(now_epoch_secs);
        let retry_after = reply.get(3).and_then(|v| v.as_float()).unwrap_or(0.1);

        Ok(if allowed {
            Decision::allowed(quota.limit(), remaining, now + quota.window_secs() as f64)
        } else {
            Decision::denied(quota.limit(), now + retry_after, retry_after)
        })
    }

    /// Composed path for stores without scripts, using the local clock.
    async fn check_composed<S: Storage>(
        &self,
        storage: &S,
        key: &str,
        quota: &Quota,
    ) -> Result<Decision> {
        let storage_key = Self::storage_key(key);
        let window = quota.window_secs() as f64;
        let now = now_epoch_secs();

        storage
            .zrem_range_by_score(&storage_key, f64::NEG_INFINITY, now - window)
            .await?;
        let count = storage.zcard(&storage_key).await?;

        if count < quota.limit() {
            storage
                .zadd(&storage_key, now, &Self::unique_member())
                .await?;
            storage.expire(&storage_key, quota.window_secs()).await?;
            return Ok(Decision::allowed(
                quota.limit(),
                quota.limit() - count - 1,
                now + window,
            ));
        }

        let oldest = storage
            .zrange(&storage_key, 0, 0)
            .await?
            .first()
            .and_then(|member| Self::member_epoch_secs(member))
            .unwrap_or(now);
        let retry_after = ((oldest + window) - now).max(0.1);

        Ok(Decision::denied(
            quota.limit(),
            now + retry_after,
            retry_after,
        ))
    }
}

impl Strategy for SlidingWindowLog {
    fn name(&self) -> &'static str {
        "sliding_window"
    }

    async fn check<S: Storage>(&self, storage: &S, key: &str, quota: &Quota) -> Result<Decision> {
        if storage.supports_atomic_scripts() {
            self.check_scripted(storage, key, quota).await
        } else {
            self.check_composed(storage, key, quota).await
        }
    }

    async fn reset<S: Storage>(&self, storage: &S, key: &str) -> Result<()> {
        storage.delete(&Self::storage_key(key)).await
    }
}
