//! In-process counter store.
//!
//! Suitable for a single node only: every process keeps its own counts.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use super::backend::CounterStore;
use super::counter::{RateLimitDecision, RateLimitRecord};
use super::policy::RateLimitPolicy;

/// Counter store backed by a sharded concurrent map.
///
/// Holding the shard's write guard across the read-then-increment makes each
/// `consume` atomic for its key.
#[derive(Debug, Default)]
pub struct InMemoryCounterStore {
    records: DashMap<String, RateLimitRecord>,
}

impl InMemoryCounterStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the record for a key, if one exists.
    pub fn record(&self, key: &str) -> Option<RateLimitRecord> {
        self.records.get(key).map(|r| *r)
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn consume(
        &self,
        key: &str,
        policy: &RateLimitPolicy,
        now: DateTime<Utc>,
    ) -> RateLimitDecision {
        if let Some(mut record) = self.records.get_mut(key) {
            return record.consume(policy, now);
        }

        let mut record = self
            .records
            .entry(key.to_string())
            .or_insert_with(|| RateLimitRecord::open(policy, now));
        record.consume(policy, now)
    }

    async fn sweep(&self, now: DateTime<Utc>) -> usize {
        let before = self.records.len();
        self.records.retain(|_, record| !record.is_expired(now));
        before.saturating_sub(self.records.len())
    }

    async fn len(&self) -> usize {
        self.records.len()
    }
}
