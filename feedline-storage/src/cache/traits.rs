//! Remote cache store traits.
//!
//! These traits describe the handful of primitives the feed cache needs from
//! a Redis-like remote store. Every method may fail with a `CacheError`; the
//! callers in this crate treat such failures as a miss (reads) or a no-op
//! (writes) and never surface them.

use async_trait::async_trait;
use feedline_core::FeedResult;
use std::time::Duration;

use super::key::CacheKey;

/// List primitives of the remote store.
///
/// Lists are kept head-first: index 0 is the most recently pushed entry,
/// which for a feed is the newest item.
///
/// # Atomicity
///
/// Each call must be atomic on its own. No multi-call transaction is ever
/// required: concurrent pushes to one key may interleave arbitrarily.
#[async_trait]
pub trait ListCacheBackend: Send + Sync {
    /// Whether a list exists for the key.
    async fn exists(&self, key: &CacheKey) -> FeedResult<bool>;

    /// Every entry of the list, head first, or `None` if absent.
    async fn range(&self, key: &CacheKey) -> FeedResult<Option<Vec<Vec<u8>>>>;

    /// Insert at the head, but only if the list already exists.
    ///
    /// Returns the new length, or `None` (and writes nothing) when the list
    /// is absent.
    async fn push_front_if_present(&self, key: &CacheKey, value: Vec<u8>)
        -> FeedResult<Option<usize>>;

    /// Create the list from a batch appended at the tail, preserving order.
    ///
    /// Only applies when the list is absent and `values` is non-empty;
    /// returns whether it was written.
    async fn append_initial(&self, key: &CacheKey, values: Vec<Vec<u8>>) -> FeedResult<bool>;

    /// Get cache statistics.
    async fn stats(&self) -> FeedResult<CacheStats>;
}

/// Integer counter primitives of the remote store.
#[async_trait]
pub trait CounterBackend: Send + Sync {
    /// Current value, or `None` if absent or expired.
    async fn get_counter(&self, key: &CacheKey) -> FeedResult<Option<i64>>;

    /// Overwrite the value, optionally expiring after `ttl`.
    async fn set_counter(&self, key: &CacheKey, value: i64, ttl: Option<Duration>)
        -> FeedResult<()>;

    /// Add `delta` if the counter exists; returns the new value, or `None`
    /// (and writes nothing) when absent.
    async fn incr_counter_if_present(&self, key: &CacheKey, delta: i64)
        -> FeedResult<Option<i64>>;
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of list reads answered from the store.
    pub hits: u64,
    /// Number of list reads that found nothing.
    pub misses: u64,
    /// Number of successful head pushes.
    pub pushes: u64,
    /// Number of lists created by an initial bulk append.
    pub populations: u64,
    /// Number of lists currently held.
    pub entry_count: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
