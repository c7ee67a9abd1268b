//! Quota snapshots reported to callers.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;

/// A read-only view of a client's quota for the window it is currently in.
///
/// `remaining` and `reset_at` always describe the same window. A client with
/// no state, or whose window has ended, is reported as a fresh window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitInfo {
    /// Configured requests per window
    pub limit: u32,
    /// Requests left in the window
    pub remaining: u32,
    /// When the window ends
    pub reset_at: Instant,
}

impl RateLimitInfo {
    /// Time left until the window ends, zero if it already has.
    pub fn reset_after(&self) -> Duration {
        self.reset_at.saturating_duration_since(Instant::now())
    }

    /// Wall-clock time at which the window ends.
    pub fn reset_at_utc(&self) -> DateTime<Utc> {
        let reset_after = chrono::Duration::from_std(self.reset_after())
            .unwrap_or(chrono::Duration::zero());
        Utc::now() + reset_after
    }

    /// Window end as Unix seconds, for `X-RateLimit-Reset`.
    pub fn reset_unix_secs(&self) -> i64 {
        self.reset_at_utc().timestamp()
    }

    /// Whole seconds a throttled client should wait, for `Retry-After`.
    ///
    /// Rounded up and never zero, so a client that honours it lands in the
    /// next window.
    pub fn retry_after_secs(&self) -> u64 {
        let reset_after = self.reset_after();
        let secs = reset_after.as_secs() + u64::from(reset_after.subsec_nanos() > 0);
        secs.max(1)
    }

    /// Whether the quota for this window is used up.
    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_reset_after_counts_down() {
        let info = RateLimitInfo {
            limit: 10,
            remaining: 4,
            reset_at: Instant::now() + Duration::from_secs(30),
        };
        assert_eq!(info.reset_after(), Duration::from_secs(30));

        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(info.reset_after(), Duration::from_secs(20));

        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(info.reset_after(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_rounds_up() {
        let info = RateLimitInfo {
            limit: 1,
            remaining: 0,
            reset_at: Instant::now() + Duration::from_millis(1500),
        };
        assert_eq!(info.retry_after_secs(), 2);
        assert!(info.is_exhausted());

        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(info.retry_after_secs(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_unix_secs_is_in_the_future() {
        let info = RateLimitInfo {
            limit: 1,
            remaining: 1,
            reset_at: Instant::now() + Duration::from_secs(120),
        };
        let now = Utc::now().timestamp();
        let reset = info.reset_unix_secs();

        assert!(reset >= now + 119);
        assert!(reset <= now + 121);
    }
}
