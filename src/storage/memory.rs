//! In-memory storage for tests and local runs.
//!
//! Emulates the shared store's TTL and ordered-score semantics in a
//! single process. Individual operations are safe to call concurrently,
//! but compound decision sequences are not linearised against each other
//! the way the shared store's scripts are; this store is intended for
//! single-threaded tests and local development only.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::error::{Result, StorageError};
use crate::storage::{BucketRecord, ScriptArg, ScriptValue, Storage, now_epoch_secs};

/// Sweep expired entries once per this many operations.
const SWEEP_EVERY: u64 = 4096;

#[derive(Debug, Clone)]
enum Value {
    Record(BucketRecord),
    Log(Vec<(f64, String)>),
}

#[derive(Debug, Clone)]
struct Stored {
    value: Value,
    expires_at: f64,
}

impl Stored {
    fn is_expired(&self, now: f64) -> bool {
        now > self.expires_at
    }
}

/// In-memory implementation of [`Storage`].
///
/// Holds records and ordered-score logs in one map, each entry paired
/// with its expiry deadline. Every read checks the deadline and removes
/// the key if past; a coarse sweep additionally reclaims idle expired
/// keys every few thousand operations.
pub struct MemoryStore {
    data: DashMap<String, Stored>,
    op_count: AtomicU64,
    sweep_lock: Mutex<()>,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("entries", &self.data.len())
            .finish()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            data: DashMap::new(),
            op_count: AtomicU64::new(0),
            sweep_lock: Mutex::new(()),
        }
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the store holds no keys.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Drop all keys.
    pub fn clear(&self) {
        self.data.clear();
    }

    /// Remove every expired key immediately.
    pub fn purge_expired(&self) {
        let now = now_epoch_secs();
        self.data.retain(|_, stored| !stored.is_expired(now));
    }

    fn maybe_sweep(&self) {
        let count = self.op_count.fetch_add(1, Ordering::Relaxed);
        if count > 0
            && count % SWEEP_EVERY == 0
            && let Some(_guard) = self.sweep_lock.try_lock()
        {
            self.purge_expired();
        }
    }

    /// Read the live entry for `key`, removing it first if expired.
    fn live(&self, key: &str) -> Option<Stored> {
        let now = now_epoch_secs();
        if let Some(stored) = self.data.get(key) {
            if !stored.is_expired(now) {
                return Some(stored.clone());
            }
            drop(stored);
            self.data.remove(key);
        }
        None
    }
}

impl Storage for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<BucketRecord>> {
        self.maybe_sweep();

        Ok(self.live(key).and_then(|stored| match stored.value {
            Value::Record(record) => Some(record),
            Value::Log(_) => None,
        }))
    }

    async fn set(&self, key: &str, record: BucketRecord, ttl_secs: u64) -> Result<()> {
        self.maybe_sweep();

        self.data.insert(
            key.to_string(),
            Stored {
                value: Value::Record(record),
                expires_at: now_epoch_secs() + ttl_secs as f64,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.data.remove(key);
        Ok(())
    }

    async fn zadd(&self, key: &str, score: f64, member: &str) -> Result<()> {
        self.maybe_sweep();

        let now = now_epoch_secs();
        let mut entry = self
            .data
            .entry(key.to_string())
            .or_insert_with(|| Stored {
                value: Value::Log(Vec::new()),
                // No TTL until expire() is called, as in the shared store.
                expires_at: f64::INFINITY,
            });

        if entry.is_expired(now) || !matches!(entry.value, Value::Log(_)) {
            entry.value = Value::Log(Vec::new());
            entry.expires_at = f64::INFINITY;
        }

        if let Value::Log(ref mut log) = entry.value {
            // Same member gets its score updated, then the log is re-sorted
            // ascending.
            log.retain(|(_, m)| m != member);
            log.push((score, member.to_string()));
            log.sort_by(|a, b| a.0.total_cmp(&b.0));
        }
        Ok(())
    }

    async fn zrem_range_by_score(&self, key: &str, lo: f64, hi: f64) -> Result<u64> {
        self.maybe_sweep();

        let now = now_epoch_secs();
        let Some(mut entry) = self.data.get_mut(key) else {
            return Ok(0);
        };
        if entry.is_expired(now) {
            drop(entry);
            self.data.remove(key);
            return Ok(0);
        }

        let Value::Log(ref mut log) = entry.value else {
            return Ok(0);
        };

        let before = log.len();
        log.retain(|(score, _)| !(lo <= *score && *score <= hi));
        Ok((before - log.len()) as u64)
    }

    async fn zcard(&self, key: &str) -> Result<u64> {
        self.maybe_sweep();

        Ok(match self.live(key) {
            Some(Stored {
                value: Value::Log(log),
                ..
            }) => log.len() as u64,
            _ => 0,
        })
    }

    async fn zrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>> {
        self.maybe_sweep();

        let Some(Stored {
            value: Value::Log(log),
            ..
        }) = self.live(key)
        else {
            return Ok(Vec::new());
        };

        let len = log.len() as i64;
        let start = if start < 0 { (len + start).max(0) } else { start };
        let stop = if stop < 0 { len + stop } else { stop };
        // Inclusive stop, clamped to the log's bounds.
        let end = (stop + 1).clamp(0, len);
        if start >= end {
            return Ok(Vec::new());
        }

        Ok(log[start as usize..end as usize]
            .iter()
            .map(|(_, member)| member.clone())
            .collect())
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> Result<()> {
        let now = now_epoch_secs();
        if let Some(mut entry) = self.data.get_mut(key)
            && !entry.is_expired(now)
        {
            entry.expires_at = now + ttl_secs as f64;
        }
        Ok(())
    }

    async fn eval_atomic(
        &self,
        _script: &'static str,
        _keys: &[&str],
        _args: &[ScriptArg],
    ) -> Result<Vec<ScriptValue>> {
        Err(StorageError::ScriptsUnsupported.into())
    }
}
