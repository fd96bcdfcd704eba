//! HTTP header names for communicating rate limit status.

/// Maximum requests allowed per window.
pub const RATE_LIMIT_LIMIT: &str = "X-RateLimit-Limit";

/// Remaining requests in the current window.
pub const RATE_LIMIT_REMAINING: &str = "X-RateLimit-Remaining";

/// Epoch second at which the rate limit resets.
pub const RATE_LIMIT_RESET: &str = "X-RateLimit-Reset";

/// Seconds until the client should retry (standard HTTP header).
pub const RETRY_AFTER: &str = "Retry-After";

/// Diagnostic header carrying the resolved tier name.
pub const USER_TIER: &str = "X-User-Tier";
