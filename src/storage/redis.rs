//! Redis storage adapter for distributed rate limiting.
//!
//! Delegates to a replicated Redis deployment through a connection pool.
//! Decision procedures run as single server-side Lua scripts via
//! [`Storage::eval_atomic`], so state for a key is only ever touched by
//! atomic compound operations.

use std::time::Duration;

use deadpool_redis::{
    Config, Connection, Pool, PoolConfig, Runtime,
    redis::{AsyncCommands, Script, Value, cmd, pipe},
};

use crate::error::{ConnectionError, Result, StorageError};
use crate::storage::{BucketRecord, ScriptArg, ScriptValue, Storage};

/// Redis storage configuration.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis connection URL (e.g., "redis://localhost:6379")
    pub url: String,
    /// Connection pool size
    pub pool_size: usize,
    /// Namespace prefix applied to every key
    pub key_prefix: String,
    /// Per-command deadline; an elapsed deadline is a transport failure
    pub command_timeout: Duration,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            pool_size: 10,
            key_prefix: "sentinel:".to_string(),
            command_timeout: Duration::from_secs(2),
        }
    }
}

impl RedisConfig {
    /// Create a new Redis configuration.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Set the key prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Set the pool size.
    pub fn with_pool_size(mut self, size: usize) -> Self {
        self.pool_size = size;
        self
    }

    /// Set the per-command deadline.
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }
}

/// Redis-backed implementation of [`Storage`].
///
/// # Example
///
/// ```ignore
/// use sentinel_ratelimit::storage::{RedisStore, RedisConfig};
///
/// let config = RedisConfig::new("redis://localhost:6379")
///     .with_prefix("myapp:")
///     .with_pool_size(20);
///
/// let store = RedisStore::new(config).await?;
/// ```
pub struct RedisStore {
    pool: Pool,
    key_prefix: String,
    command_timeout: Duration,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("key_prefix", &self.key_prefix)
            .finish()
    }
}

impl RedisStore {
    /// Create a new Redis store from configuration.
    ///
    /// Verifies connectivity with a `PING` before returning.
    pub async fn new(config: RedisConfig) -> Result<Self> {
        let mut cfg = Config::from_url(&config.url);
        cfg.pool = Some(PoolConfig::new(config.pool_size));
        let pool = cfg
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| ConnectionError::ConnectionFailed(e.to_string()))?;

        let mut conn = pool
            .get()
            .await
            .map_err(|e| ConnectionError::ConnectionFailed(e.to_string()))?;
        let _: () = cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| ConnectionError::ConnectionFailed(e.to_string()))?;

        Ok(Self {
            pool,
            key_prefix: config.key_prefix,
            command_timeout: config.command_timeout,
        })
    }

    /// Create a new Redis store from a URL with default settings.
    pub async fn from_url(url: impl Into<String>) -> Result<Self> {
        Self::new(RedisConfig::new(url)).await
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }

    async fn get_conn(&self) -> Result<Connection> {
        self.pool
            .get()
            .await
            .map_err(|_| StorageError::PoolExhausted.into())
    }

    /// Run a storage operation under the configured command deadline.
    async fn deadline<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::time::timeout(self.command_timeout, fut)
            .await
            .map_err(|_| ConnectionError::Timeout(self.command_timeout))?
    }
}

/// Scores cross the wire as strings so the unbounded ends stay exact.
fn format_score(score: f64) -> String {
    if score == f64::NEG_INFINITY {
        "-inf".to_string()
    } else if score == f64::INFINITY {
        "+inf".to_string()
    } else {
        score.to_string()
    }
}

fn op_err(e: deadpool_redis::redis::RedisError) -> crate::error::RateLimitError {
    StorageError::operation_failed(e.to_string(), true).into()
}

fn reply_element(value: Value) -> Result<ScriptValue> {
    match value {
        Value::Int(n) => Ok(ScriptValue::Int(n)),
        Value::BulkString(bytes) => Ok(ScriptValue::Data(
            String::from_utf8(bytes)
                .map_err(|e| StorageError::Serialization(e.to_string()))?,
        )),
        Value::SimpleString(s) => Ok(ScriptValue::Data(s)),
        other => Err(StorageError::Serialization(format!(
            "unexpected script reply element: {other:?}"
        ))
        .into()),
    }
}

impl Storage for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<BucketRecord>> {
        let full_key = self.full_key(key);
        self.deadline(async {
            let mut conn = self.get_conn().await?;

            let fields: Vec<(String, String)> =
                conn.hgetall(&full_key).await.map_err(op_err)?;
            if fields.is_empty() {
                return Ok(None);
            }

            let mut tokens = None;
            let mut last_refill = None;
            for (name, value) in fields {
                match name.as_str() {
                    "tokens" => tokens = value.parse::<f64>().ok(),
                    "last_refill" => last_refill = value.parse::<f64>().ok(),
                    _ => {}
                }
            }

            match (tokens, last_refill) {
                (Some(tokens), Some(last_refill)) => {
                    Ok(Some(BucketRecord::new(tokens, last_refill)))
                }
                _ => Err(StorageError::Serialization(format!(
                    "malformed bucket record at {full_key}"
                ))
                .into()),
            }
        })
        .await
    }

    async fn set(&self, key: &str, record: BucketRecord, ttl_secs: u64) -> Result<()> {
        let full_key = self.full_key(key);
        self.deadline(async {
            let mut conn = self.get_conn().await?;

            // Replace and apply the TTL in one MULTI/EXEC step.
            let _: () = pipe()
                .atomic()
                .del(&full_key)
                .hset(&full_key, "tokens", record.tokens.to_string())
                .hset(&full_key, "last_refill", record.last_refill.to_string())
                .expire(&full_key, ttl_secs as i64)
                .query_async(&mut conn)
                .await
                .map_err(op_err)?;
            Ok(())
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let full_key = self.full_key(key);
        self.deadline(async {
            let mut conn = self.get_conn().await?;
            let _: () = conn.del(&full_key).await.map_err(op_err)?;
            Ok(())
        })
        .await
    }

    async fn zadd(&self, key: &str, score: f64, member: &str) -> Result<()> {
        let full_key = self.full_key(key);
        self.deadline(async {
            let mut conn = self.get_conn().await?;
            let _: () = conn.zadd(&full_key, member, score).await.map_err(op_err)?;
            Ok(())
        })
        .await
    }

    async fn zrem_range_by_score(&self, key: &str, lo: f64, hi: f64) -> Result<u64> {
        let full_key = self.full_key(key);
        self.deadline(async {
            let mut conn = self.get_conn().await?;
            let removed: u64 = cmd("ZREMRANGEBYSCORE")
                .arg(&full_key)
                .arg(format_score(lo))
                .arg(format_score(hi))
                .query_async(&mut conn)
                .await
                .map_err(op_err)?;
            Ok(removed)
        })
        .await
    }

    async fn zcard(&self, key: &str) -> Result<u64> {
        let full_key = self.full_key(key);
        self.deadline(async {
            let mut conn = self.get_conn().await?;
            let count: u64 = conn.zcard(&full_key).await.map_err(op_err)?;
            Ok(count)
        })
        .await
    }

    async fn zrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>> {
        let full_key = self.full_key(key);
        self.deadline(async {
            let mut conn = self.get_conn().await?;
            let members: Vec<String> = conn
                .zrange(&full_key, start as isize, stop as isize)
                .await
                .map_err(op_err)?;
            Ok(members)
        })
        .await
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> Result<()> {
        let full_key = self.full_key(key);
        self.deadline(async {
            let mut conn = self.get_conn().await?;
            let _: bool = conn.expire(&full_key, ttl_secs as i64).await.map_err(op_err)?;
            Ok(())
        })
        .await
    }

    async fn eval_atomic(
        &self,
        script: &'static str,
        keys: &[&str],
        args: &[ScriptArg],
    ) -> Result<Vec<ScriptValue>> {
        self.deadline(async {
            let mut conn = self.get_conn().await?;

            let script = Script::new(script);
            let mut invocation = script.prepare_invoke();
            for key in keys {
                invocation.key(self.full_key(key));
            }
            for arg in args {
                match arg {
                    ScriptArg::Int(n) => invocation.arg(*n),
                    ScriptArg::Float(f) => invocation.arg(f.to_string()),
                    ScriptArg::Str(s) => invocation.arg(s.as_str()),
                };
            }

            let reply: Value = invocation.invoke_async(&mut conn).await.map_err(op_err)?;
            match reply {
                Value::Array(items) => items.into_iter().map(reply_element).collect(),
                other => Ok(vec![reply_element(other)?]),
            }
        })
        .await
    }

    fn supports_atomic_scripts(&self) -> bool {
        true
    }
}
