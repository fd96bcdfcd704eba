//! Quota configuration and per-client quota resolution.
//!
//! A `Quota` is the pair of a request limit and the trailing window (in
//! seconds) it applies to. The `QuotaResolver` maps a client identity to
//! the quota of its tier; tier selection is a pure function of the
//! identity and never touches storage.
//!
//! # Examples
//!
//! ```ignore
//! use sentinel_ratelimit::{Quota, QuotaResolver};
//!
//! let resolver = QuotaResolver::new();
//! let quota = resolver.resolve("api:vip_abc123");
//! assert_eq!(quota.limit(), 500);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::identity;

/// Rate limiting quota: at most `limit` requests per trailing `window`
/// seconds. Immutable once resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quota {
    limit: u64,
    window_secs: u64,
}

impl Quota {
    /// Create a new quota.
    ///
    /// # Panics
    ///
    /// Panics if `limit` or `window_secs` is 0. Zero values are a
    /// programmer error; use [`Quota::try_new`] for fallible construction.
    pub fn new(limit: u64, window_secs: u64) -> Self {
        assert!(limit > 0, "limit must be greater than 0");
        assert!(window_secs > 0, "window must be greater than 0");

        Self { limit, window_secs }
    }

    /// Try to create a new quota, returning an error if invalid.
    pub fn try_new(limit: u64, window_secs: u64) -> Result<Self> {
        if limit == 0 {
            return Err(ConfigError::InvalidQuota("limit must be greater than 0".into()).into());
        }
        if window_secs == 0 {
            return Err(ConfigError::InvalidQuota("window must be greater than 0".into()).into());
        }
        Ok(Self { limit, window_secs })
    }

    /// Create a quota allowing `n` requests per second.
    pub fn per_second(n: u64) -> Self {
        Self::new(n, 1)
    }

    /// Create a quota allowing `n` requests per minute.
    pub fn per_minute(n: u64) -> Self {
        Self::new(n, 60)
    }

    /// Maximum requests allowed in the window.
    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Window duration in seconds.
    pub fn window_secs(&self) -> u64 {
        self.window_secs
    }

    /// Steady-state refill rate in tokens per second.
    pub fn refill_rate(&self) -> f64 {
        self.limit as f64 / self.window_secs as f64
    }
}

impl Default for Quota {
    fn default() -> Self {
        Self::per_minute(100)
    }
}

/// Client tiers recognised by the shipped quota policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserTier {
    /// Unauthenticated or unrecognised clients.
    Free,
    /// `prem_`-prefixed API credentials.
    Premium,
    /// `vip_`-prefixed API credentials.
    Vip,
}

impl UserTier {
    /// Tier name as emitted in the `X-User-Tier` header.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Premium => "premium",
            Self::Vip => "vip",
        }
    }
}

impl std::fmt::Display for UserTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tier-to-quota table. Process-local and immutable after startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierTable {
    /// Quota for the free tier.
    pub free: Quota,
    /// Quota for the premium tier.
    pub premium: Quota,
    /// Quota for the VIP tier.
    pub vip: Quota,
}

impl Default for TierTable {
    fn default() -> Self {
        Self {
            free: Quota::per_minute(5),
            premium: Quota::per_minute(50),
            vip: Quota::per_minute(500),
        }
    }
}

impl TierTable {
    /// Replace the free-tier quota, e.g. with the configured default.
    pub fn with_free(mut self, quota: Quota) -> Self {
        self.free = quota;
        self
    }

    /// Look up the quota for a tier.
    pub fn quota(&self, tier: UserTier) -> Quota {
        match tier {
            UserTier::Free => self.free,
            UserTier::Premium => self.premium,
            UserTier::Vip => self.vip,
        }
    }
}

/// Maps a client identity to its tier and quota.
///
/// Deterministic and side-effect-free; safe to share behind an `Arc` and
/// read lock-free from every request.
#[derive(Debug, Clone, Default)]
pub struct QuotaResolver {
    table: TierTable,
}

impl QuotaResolver {
    /// Create a resolver with the default tier table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a resolver with a custom tier table.
    pub fn with_table(table: TierTable) -> Self {
        Self { table }
    }

    /// Resolve the quota for a client identity.
    pub fn resolve(&self, client_id: &str) -> Quota {
        self.table.quota(self.tier(client_id))
    }

    /// Resolve the displayable tier for a client identity.
    ///
    /// Only `api:` identities can reach the paid tiers; anything else,
    /// including plain `ip:` identities, lands on the free tier.
    pub fn tier(&self, client_id: &str) -> UserTier {
        match identity::api_credential(client_id) {
            Some(key) if key.starts_with("vip_") => UserTier::Vip,
            Some(key) if key.starts_with("prem_") => UserTier::Premium,
            _ => UserTier::Free,
        }
    }
}
