//! Authoritative store traits.
//!
//! The cache layer never owns data. Everything it serves can be re-derived
//! from these two interfaces, and errors they raise are the only errors the
//! feed path propagates to its callers.

use ::async_trait::async_trait;
use feedline_core::{CounterKey, FeedEntry, FeedResult, PartitionKey, Timestamp};

/// Timestamp filter of a range query. Both bounds are strict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeBound {
    /// `created_at > t`
    NewerThan(Timestamp),
    /// `created_at < t`
    OlderThan(Timestamp),
}

/// "Items of a partition, newest-first, optionally filtered and limited."
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RangeQuery {
    pub bound: Option<TimeBound>,
    pub limit: Option<usize>,
}

impl RangeQuery {
    /// Every item of the partition.
    pub fn all() -> Self {
        Self::default()
    }

    /// The `n` newest items.
    pub fn latest(n: usize) -> Self {
        Self {
            bound: None,
            limit: Some(n),
        }
    }

    /// Every item strictly newer than `t`.
    pub fn newer_than(t: Timestamp) -> Self {
        Self {
            bound: Some(TimeBound::NewerThan(t)),
            limit: None,
        }
    }

    /// Up to `limit` items strictly older than `t`.
    pub fn older_than(t: Timestamp, limit: usize) -> Self {
        Self {
            bound: Some(TimeBound::OlderThan(t)),
            limit: Some(limit),
        }
    }

    /// Whether an item created at `created_at` passes the bound.
    pub fn admits(&self, created_at: Timestamp) -> bool {
        match self.bound {
            None => true,
            Some(TimeBound::NewerThan(t)) => created_at > t,
            Some(TimeBound::OlderThan(t)) => created_at < t,
        }
    }
}

/// The authoritative ordered store behind a feed.
///
/// Implementations return items newest-first. Ties on `created_at` keep the
/// store's own stable order.
#[async_trait]
pub trait OrderedSource<T: FeedEntry>: Send + Sync {
    async fn fetch_range(&self, partition: &PartitionKey, query: &RangeQuery)
        -> FeedResult<Vec<T>>;
}

/// The authoritative side of denormalized counters.
#[async_trait]
pub trait CounterSource: Send + Sync {
    /// Re-read the counter field stored on the parent entity.
    async fn denormalized_count(&self, key: &CounterKey) -> FeedResult<i64>;

    /// Count the child rows the counter is meant to mirror.
    async fn count_children(&self, key: &CounterKey) -> FeedResult<i64>;

    /// Overwrite the counter field on the parent entity and persist it.
    async fn store_denormalized_count(&self, key: &CounterKey, value: i64) -> FeedResult<()>;
}
