//! Token Bucket rate limiting strategy.

use crate::decision::Decision;
use crate::error::Result;
use crate::quota::Quota;
use crate::storage::{BucketRecord, ScriptArg, Storage, now_epoch_secs};
use crate::strategy::Strategy;

/// Key prefix for token bucket state.
const KEY_PREFIX: &str = "tb:";

/// Atomic decision procedure, executed server-side against the shared
/// store. Reads the store's own clock so fleet members need no clock
/// agreement. Fractional values come back as strings because the script
/// runtime truncates numeric replies to integers.
const CHECK_SCRIPT: &str = r#"
local key = KEYS[1]
local capacity = tonumber(ARGV[1])
local rate = tonumber(ARGV[2])
local window = tonumber(ARGV[3])

local time = redis.call('TIME')
local now = tonumber(time[1]) + tonumber(time[2]) / 1000000

local state = redis.call('HMGET', key, 'tokens', 'last_refill')
local tokens = tonumber(state[1])
local last_refill = tonumber(state[2])

if tokens == nil then
    tokens = capacity
    last_refill = now
end

local elapsed = math.max(0, now - last_refill)
tokens = math.min(capacity, tokens + elapsed * rate)

local allowed = 0
if tokens >= 1.0 then
    allowed = 1
    tokens = tokens - 1.0
end

redis.call('HSET', key, 'tokens', tokens, 'last_refill', now)
redis.call('EXPIRE', key, window * 2)

return {allowed, tostring(tokens), tostring(now)}
"#;

/// Token Bucket strategy.
///
/// The bucket starts full at `limit` tokens and refills lazily at
/// `limit / window` tokens per second, so a quiet client can burst up to
/// `limit` requests and then sustain the steady-state rate. No
/// background timer; refill is computed from elapsed time on access.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenBucket;

impl TokenBucket {
    /// Create a new Token Bucket strategy instance.
    pub fn new() -> Self {
        Self
    }

    fn storage_key(key: &str) -> String {
        format!("{KEY_PREFIX}{key}")
    }

    fn decide(tokens: f64, allowed: bool, now: f64, quota: &Quota) -> Decision {
        if allowed {
            Decision::allowed(
                quota.limit(),
                tokens.floor() as u64,
                now + quota.window_secs() as f64,
            )
        } else {
            let retry_after = (1.0 - tokens) / quota.refill_rate();
            Decision::denied(quota.limit(), now + retry_after.max(0.1), retry_after)
        }
    }

    /// One-round-trip path: the whole procedure runs inside the store.
    async fn check_scripted<S: Storage>(
        &self,
        storage: &S,
        key: &str,
        quota: &Quota,
    ) -> Result<Decision> {
        let reply = storage
            .eval_atomic(
                CHECK_SCRIPT,
                &[&Self::storage_key(key)],
                &[
                    ScriptArg::Int(quota.limit() as i64),
                    ScriptArg::Float(quota.refill_rate()),
                    ScriptArg::Int(quota.window_secs() as i64),
                ],
            )
            .await?;

        let allowed = reply.first().and_then(|v| v.as_int()).unwrap_or(0) == 1;
        let tokens = reply.get(1).and_then(|v| v.as_float()).unwrap_or(0.0);
        let now = reply
            .get(2)
            .and_then(|v| v.as_float())
            .unwrap_or_else(now_epoch_secs);

        Ok(Self::decide(tokens, allowed, now, quota))
    }

    /// Composed path for stores without scripts, using the local clock.
    async fn check_composed<S: Storage>(
        &self,
        storage: &S,
        key: &str,
        quota: &Quota,
    ) -> Result<Decision> {
        let storage_key = Self::storage_key(key);
        let capacity = quota.limit() as f64;
        let now = now_epoch_secs();

        let (mut tokens, last_refill) = match storage.get(&storage_key).await? {
            Some(record) => (record.tokens, record.last_refill),
            None => (capacity, now),
        };

        let elapsed = (now - last_refill).max(0.0);
        tokens = (tokens + elapsed * quota.refill_rate()).min(capacity);

        let allowed = tokens >= 1.0;
        if allowed {
            tokens -= 1.0;
        }

        storage
            .set(
                &storage_key,
                BucketRecord::new(tokens, now),
                quota.window_secs() * 2,
            )
            .await?;

        Ok(Self::decide(tokens, allowed, now, quota))
    }
}

impl Strategy for TokenBucket {
    fn name(&self) -> &'static str {
        "token_bucket"
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
