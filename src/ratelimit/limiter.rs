//! Core rate limiter implementation.

use chrono::{DateTime, Utc};
use rand::Rng;
use std::sync::Arc;
use tracing::{debug, trace};

use super::backend::CounterStore;
use super::clock::{Clock, SystemClock};
use super::counter::RateLimitDecision;
use super::policy::RateLimitPolicy;
use super::store::InMemoryCounterStore;

/// Default chance that a call also sweeps expired records.
pub const DEFAULT_SWEEP_PROBABILITY: f64 = 0.01;

/// Fixed-window rate limiter over a [`CounterStore`].
///
/// This struct is thread-safe and can be shared across tasks through an `Arc`.
/// Callers never touch the store directly; every mutation goes through
/// [`RateLimiter::check_and_consume`].
pub struct RateLimiter<S: CounterStore = InMemoryCounterStore> {
    /// Where the counters live
    store: S,
    /// Source of window timestamps
    clock: Arc<dyn Clock>,
    /// Chance per call of sweeping expired records
    sweep_probability: f64,
    /// When false every request is admitted and nothing is counted
    enabled: bool,
}

impl RateLimiter<InMemoryCounterStore> {
    /// Create an in-process rate limiter using the system clock.
    pub fn new() -> Self {
        Self::with_store(InMemoryCounterStore::new(), Arc::new(SystemClock::new()))
    }
}

impl Default for RateLimiter<InMemoryCounterStore> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: CounterStore> RateLimiter<S> {
    /// Create a rate limiter over a specific store and clock.
    pub fn with_store(store: S, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            sweep_probability: DEFAULT_SWEEP_PROBABILITY,
            enabled: true,
        }
    }

    /// Set the chance per call of sweeping expired records. Clamped to [0, 1].
    pub fn with_sweep_probability(mut self, probability: f64) -> Self {
        self.sweep_probability = probability.clamp(0.0, 1.0);
        self
    }

    /// Turn limiting on or off.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Whether limiting is active.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Current time according to the limiter's clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Count one request against `key` under `policy`.
    ///
    /// Never fails: a full window yields a rejected decision carrying the
    /// existing reset time.
    pub async fn check_and_consume(&self, key: &str, policy: &RateLimitPolicy) -> RateLimitDecision {
        let now = self.clock.now();

        if !self.enabled {
            return RateLimitDecision::unlimited(policy, now);
        }

        self.maybe_sweep(now).await;

        trace!(
            key = %key,
            limit = policy.max_requests,
            window_ms = policy.window_ms,
            "Checking rate limit"
        );

        let decision = self.store.consume(key, policy, now).await;

        if !decision.admitted {
            debug!(
                key = %key,
                reset_at = %decision.window_reset_at,
                "Rate limit exceeded"
            );
        }

        decision
    }

    /// Remove every expired record now.
    pub async fn sweep(&self) -> usize {
        self.store.sweep(self.clock.now()).await
    }

    /// Number of keys the store is tracking.
    pub async fn tracked_keys(&self) -> usize {
        self.store.len().await
    }

    async fn maybe_sweep(&self, now: DateTime<Utc>) {
        if self.sweep_probability <= 0.0 {
            return;
        }

        let roll = rand::thread_rng().gen_bool(self.sweep_probability);
        if roll {
            let removed = self.store.sweep(now).await;
            if removed > 0 {
                debug!(removed = removed, "Swept expired rate limit records");
            }
        }
    }
}
