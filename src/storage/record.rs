//! Stored token-bucket state.

use serde::{Deserialize, Serialize};

/// Value stored under a `tb:` key: the bucket fill level and the epoch
/// second of the last refill.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BucketRecord {
    /// Tokens currently in the bucket. Non-negative, never above the limit.
    pub tokens: f64,
    /// Absolute time of the last refill, seconds since epoch.
    pub last_refill: f64,
}

impl BucketRecord {
    /// Create a new record.
    pub fn new(tokens: f64, last_refill: f64) -> Self {
        Self {
            tokens,
            last_refill,
        }
    }
}
