//! Decision types for rate limiting results.
//!
//! Every strategy call produces a `Decision` that carries the allow/deny
//! verdict together with the values the interceptor stamps into the
//! standard rate-limit response headers.

/// The verdict of a rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitStatus {
    /// Request is within limits and should proceed.
    Allowed,
    /// Request exceeds limits and should be rejected (HTTP 429).
    Denied,
}

/// Immutable result of one rate limit check.
#[derive(Debug, Clone)]
pub struct Decision {
    /// Whether the request is allowed or denied.
    pub status: RateLimitStatus,
    /// Maximum requests allowed in the window, echoed from the quota.
    pub limit: u64,
    /// Requests remaining in the current window. Always 0 on a denial.
    pub remaining: u64,
    /// Absolute time, seconds since epoch, when the client next has capacity.
    pub reset_at: f64,
    /// Seconds until the client may retry. Present iff denied.
    pub retry_after: Option<f64>,
}

impl Decision {
    /// Create a new "allowed" decision.
    pub fn allowed(limit: u64, remaining: u64, reset_at: f64) -> Self {
        Self {
            status: RateLimitStatus::Allowed,
            limit,
            remaining: remaining.min(limit),
            reset_at,
            retry_after: None,
        }
    }

    /// Create a new "denied" decision.
    ///
    /// `remaining` is pinned to 0 and `retry_after` floored at 0.1s so a
    /// denied client never thrashes with an instant retry.
    pub fn denied(limit: u64, reset_at: f64, retry_after: f64) -> Self {
        Self {
            status: RateLimitStatus::Denied,
            limit,
            remaining: 0,
            reset_at,
            retry_after: Some(retry_after.max(0.1)),
        }
    }

    /// Check if the request is allowed.
    pub fn is_allowed(&self) -> bool {
        self.status == RateLimitStatus::Allowed
    }

    /// Check if the request is denied.
    pub fn is_denied(&self) -> bool {
        self.status == RateLimitStatus::Denied
    }

    /// Reset time truncated to whole seconds since epoch, as emitted in
    /// `X-RateLimit-Reset`.
    pub fn reset_epoch_secs(&self) -> u64 {
        self.reset_at.max(0.0) as u64
    }

    /// `Retry-After` header value: retry_after rounded up, at least 1.
    pub fn retry_after_secs(&self) -> u64 {
        (self.retry_after.unwrap_or(1.0).ceil() as u64).max(1)
    }

    /// The rate-limit headers this decision maps to.
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        vec![
            (crate::headers::RATE_LIMIT_LIMIT, self.limit.to_string()),
            (
                crate::headers::RATE_LIMIT_REMAINING,
                self.remaining.to_string(),
            ),
            (
                crate::headers::RATE_LIMIT_RESET,
                self.reset_epoch_secs().to_string(),
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_allowed() {
        let decision = Decision::allowed(100, 99, 1_700_000_060.0);

        assert!(decision.is_allowed());
        assert!(!decision.is_denied());
        assert_eq!(decision.limit, 100);
        assert_eq!(decision.remaining, 99);
        assert!(decision.retry_after.is_none());
    }

    #[test]
    fn test_decision_denied() {
        let decision = Decision::denied(100, 1_700_000_030.0, 30.0);

        assert!(decision.is_denied());
        assert_eq!(decision.remaining, 0);
        assert_eq!(decision.retry_after, Some(30.0));
        assert_eq!(decision.retry_after_secs(), 30);
    }

    #[test]
    fn test_denied_retry_floor() {
        let decision = Decision::denied(10, 1_700_000_000.05, 0.0);
        assert_eq!(decision.retry_after, Some(0.1));
        // Retry-After header never goes below 1.
        assert_eq!(decision.retry_after_secs(), 1);
    }

    #[test]
    fn test_remaining_clamped_to_limit() {
        let decision = Decision::allowed(5, 9, 1_700_000_000.0);
        assert_eq!(decision.remaining, 5);
    }

    #[test]
    fn test_decision_headers() {
        let decision = Decision::allowed(100, 50, 1_700_000_060.7);
        let headers = decision.headers();

        assert!(
            headers
                .iter()
                .any(|(k, v)| *k == "X-RateLimit-Limit" && v == "100")
        );
        assert!(
            headers
                .iter()
                .any(|(k, v)| *k == "X-RateLimit-Remaining" && v == "50")
        );
        assert!(
            headers
                .iter()
                .any(|(k, v)| *k == "X-RateLimit-Reset" && v == "1700000060")
        );
    }
}
