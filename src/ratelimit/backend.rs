//! Counter store trait for abstracting local and shared implementations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::counter::RateLimitDecision;
use super::policy::RateLimitPolicy;

/// Backing storage for rate limit counters.
///
/// `consume` must be atomic per key: two concurrent calls for the same key
/// never both observe the same count. The in-process store satisfies this
/// with a per-shard lock; a store shared between nodes needs an atomic
/// increment-with-expiry primitive on the remote side.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Count one request against `key` and report whether it is admitted.
    async fn consume(
        &self,
        key: &str,
        policy: &RateLimitPolicy,
        now: DateTime<Utc>,
    ) -> RateLimitDecision;

    /// Drop every record whose window has closed, returning how many went.
    async fn sweep(&self, now: DateTime<Utc>) -> usize;

    /// Number of keys currently tracked, expired or not.
    async fn len(&self) -> usize;
}
