//! Process-wide settings, read once from the environment at startup.
//!
//! | Variable              | Default        |
//! |-----------------------|----------------|
//! | `APP_NAME`            | `sentinel`     |
//! | `RATE_LIMIT_STRATEGY` | `token_bucket` |
//! | `RATE_LIMIT_DEFAULT`  | `100`          |
//! | `RATE_LIMIT_WINDOW`   | `60`           |
//! | `REDIS_URL`           | unset          |
//!
//! The chosen strategy governs which algorithm the interceptor
//! dispatches to; switching at runtime is not supported.

use std::str::FromStr;

use crate::error::{ConfigError, Result};
use crate::quota::Quota;

/// Which counting algorithm a deployment runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StrategyKind {
    /// Lazy-refill token bucket with burst tolerance.
    #[default]
    TokenBucket,
    /// Exact-count sliding window log.
    SlidingWindow,
}

impl StrategyKind {
    /// Config-facing name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TokenBucket => "token_bucket",
            Self::SlidingWindow => "sliding_window",
        }
    }
}

impl FromStr for StrategyKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "token_bucket" => Ok(Self::TokenBucket),
            "sliding_window" => Ok(Self::SlidingWindow),
            other => Err(ConfigError::InvalidStrategy(other.to_string())),
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Application settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Application name, used for log context.
    pub app_name: String,
    /// Default strategy choice.
    pub strategy: StrategyKind,
    /// Default request limit (the free-tier quota).
    pub default_limit: u64,
    /// Default window in seconds.
    pub default_window: u64,
    /// Shared-store connection URL; absent means in-memory storage.
    pub redis_url: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            app_name: "sentinel".to_string(),
            strategy: StrategyKind::default(),
            default_limit: 100,
            default_window: 60,
            redis_url: None,
        }
    }
}

impl Settings {
    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self> {
        let mut settings = Self::default();

        if let Ok(name) = std::env::var("APP_NAME") {
            settings.app_name = name;
        }
        if let Ok(value) = std::env::var("RATE_LIMIT_STRATEGY") {
            settings.strategy = value.parse()?;
        }
        if let Ok(value) = std::env::var("RATE_LIMIT_DEFAULT") {
            settings.default_limit = parse_var("RATE_LIMIT_DEFAULT", &value)?;
        }
        if let Ok(value) = std::env::var("RATE_LIMIT_WINDOW") {
            settings.default_window = parse_var("RATE_LIMIT_WINDOW", &value)?;
        }
        if let Ok(url) = std::env::var("REDIS_URL") {
            settings.redis_url = Some(url);
        }

        // Reject zero limits at startup rather than at check time.
        Quota::try_new(settings.default_limit, settings.default_window)?;

        Ok(settings)
    }

    /// The default quota these settings describe.
    pub fn default_quota(&self) -> Quota {
        Quota::new(self.default_limit, self.default_window)
    }
}

fn parse_var(name: &'static str, value: &str) -> Result<u64> {
    value.parse().map_err(|_| {
        ConfigError::InvalidValue {
            name,
            value: value.to_string(),
        }
        .into()
    })
}
