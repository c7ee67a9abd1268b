//! Per-client fixed-window state.

use std::time::Duration;
use tokio::time::Instant;

/// Quota state for a single client within its current fixed window.
///
/// A window is created on the client's first request and reset lazily by the
/// first request that arrives at or after `reset_at`. There is no timer per
/// client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientWindow {
    /// Requests left in the current window, always in `0..=limit`
    remaining: u32,
    /// When the current window ends
    reset_at: Instant,
    /// Most recent request from this client, admitted or not
    last_seen_at: Instant,
}

impl ClientWindow {
    /// Open a window for a client's first request.
    ///
    /// The opening request consumes one unit of quota.
    pub fn open(limit: u32, window: Duration, now: Instant) -> Self {
        Self {
            remaining: limit.saturating_sub(1),
            reset_at: now + window,
            last_seen_at: now,
        }
    }

    /// Record a request at `now` and decide whether it is admitted.
    ///
    /// Returns `true` if the request fits in the current window (or a fresh
    /// window was started), `false` if the quota is exhausted. A denied
    /// request still refreshes `last_seen_at`.
    pub fn admit(&mut self, limit: u32, window: Duration, now: Instant) -> bool {
        self.last_seen_at = now;

        if self.is_expired(now) {
            self.remaining = limit.saturating_sub(1);
            self.reset_at = now + window;
            return true;
        }

        if self.remaining > 0 {
            self.remaining -= 1;
            return true;
        }

        false
    }

    /// Whether the window has ended as of `now`.
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.reset_at
    }

    /// Whether the client has been idle for longer than `max_idle`.
    pub fn is_stale(&self, max_idle: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.last_seen_at) > max_idle
    }

    /// Requests left in the current window.
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// When the current window ends.
    pub fn reset_at(&self) -> Instant {
        self.reset_at
    }

    /// Most recent request from this client.
    pub fn last_seen_at(&self) -> Instant {
        self.last_seen_at
    }
}
