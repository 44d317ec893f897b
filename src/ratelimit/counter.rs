//! Fixed-window counter records and the decisions they produce.
//!
//! A window opens on the first request for a key and closes `window_ms` later.
//! Bursts straddling a window boundary can briefly exceed the average rate;
//! that is accepted for a fixed-window counter.

use chrono::{DateTime, TimeDelta, Utc};

use super::policy::RateLimitPolicy;

/// The state kept for one rate limit key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitRecord {
    /// Requests admitted in the current window
    count: u32,
    /// When the current window closes
    window_reset_at: DateTime<Utc>,
}

impl RateLimitRecord {
    /// Open an empty window starting at `now`.
    pub fn open(policy: &RateLimitPolicy, now: DateTime<Utc>) -> Self {
        Self {
            count: 0,
            window_reset_at: window_end(policy, now),
        }
    }

    /// Requests admitted in the current window.
    pub fn count(&self) -> u32 {
        self.count
    }

    /// When the current window closes.
    pub fn window_reset_at(&self) -> DateTime<Utc> {
        self.window_reset_at
    }

    /// A record whose window has closed is treated as absent. The record is
    /// still live at exactly `window_reset_at`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.window_reset_at
    }

    /// Apply one request to this record.
    ///
    /// An expired record is replaced by a fresh window first. A full window
    /// rejects without incrementing.
    pub fn consume(&mut self, policy: &RateLimitPolicy, now: DateTime<Utc>) -> RateLimitDecision {
        if self.is_expired(now) {
            *self = Self::open(policy, now);
        }

        if self.count >= policy.max_requests {
            return RateLimitDecision::rejected(policy, self.window_reset_at);
        }

        self.count += 1;
        RateLimitDecision {
            admitted: true,
            limit: policy.max_requests,
            remaining: policy.max_requests - self.count,
            window_reset_at: self.window_reset_at,
        }
    }
}

/// End of a window opened at `now`, saturating at the latest representable
/// instant.
fn window_end(policy: &RateLimitPolicy, now: DateTime<Utc>) -> DateTime<Utc> {
    i64::try_from(policy.window_ms)
        .ok()
        .and_then(TimeDelta::try_milliseconds)
        .and_then(|window| now.checked_add_signed(window))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Outcome of a check-and-consume call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    /// Whether the request may proceed
    pub admitted: bool,
    /// The quota of the policy that was applied
    pub limit: u32,
    /// Requests left in the current window
    pub remaining: u32,
    /// When the current window closes
    pub window_reset_at: DateTime<Utc>,
}

impl RateLimitDecision {
    /// A decision admitting every request, used when limiting is disabled.
    pub fn unlimited(policy: &RateLimitPolicy, now: DateTime<Utc>) -> Self {
        Self {
            admitted: true,
            limit: policy.max_requests,
            remaining: policy.max_requests,
            window_reset_at: window_end(policy, now),
        }
    }

    fn rejected(policy: &RateLimitPolicy, window_reset_at: DateTime<Utc>) -> Self {
        Self {
            admitted: false,
            limit: policy.max_requests,
            remaining: 0,
            window_reset_at,
        }
    }

    /// Whole seconds until the window resets, rounded up. Never negative.
    pub fn retry_after_secs(&self, now: DateTime<Utc>) -> u64 {
        let millis = (self.window_reset_at - now).num_milliseconds();
        if millis <= 0 {
            0
        } else {
            (millis as u64).div_ceil(1000)
        }
    }

    /// Reset time as milliseconds since the Unix epoch.
    pub fn reset_epoch_millis(&self) -> i64 {
        self.window_reset_at.timestamp_millis()
    }
}
