//! Denormalized counters with probabilistic reconciliation.
//!
//! Counter reads normally cost one remote-store lookup. With probability
//! `reconcile_probability` a read instead recounts the child rows in the
//! authoritative store and repairs the denormalized field if it drifted.
//! Drift therefore survives `1 / p` reads in expectation.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use feedline_core::{CounterKey, CounterRecord, FeedConfig, FeedResult, ReconciliationError};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use crate::cache::{CacheKey, CounterBackend};
use crate::source::CounterSource;

/// Source of uniform samples in `[0, 1)` used to decide whether a read
/// reconciles.
pub trait UniformSource: Send + Sync {
    fn next_unit(&self) -> f64;
}

/// Samples from the thread-local RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRngSource;

impl UniformSource for ThreadRngSource {
    fn next_unit(&self) -> f64 {
        rand::random::<f64>()
    }
}

/// Reproducible samples from a seeded RNG.
#[derive(Debug)]
pub struct SeededSource {
    rng: Mutex<StdRng>,
}

impl SeededSource {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl UniformSource for SeededSource {
    fn next_unit(&self) -> f64 {
        match self.rng.lock() {
            Ok(mut rng) => rng.random::<f64>(),
            // A poisoned RNG still yields valid samples.
            Err(poisoned) => poisoned.into_inner().random::<f64>(),
        }
    }
}

/// Always returns the same sample. `ConstantSource(0.0)` reconciles on every
/// read for any `p > 0`; `ConstantSource(1.0)` never does.
#[derive(Debug, Clone, Copy)]
pub struct ConstantSource(pub f64);

impl UniformSource for ConstantSource {
    fn next_unit(&self) -> f64 {
        self.0
    }
}

/// Remote-store cache in front of the denormalized counters of an
/// authoritative store.
pub struct CounterCache<B, S>
where
    B: CounterBackend,
    S: CounterSource,
{
    backend: Arc<B>,
    source: Arc<S>,
    random: Arc<dyn UniformSource>,
    probability: f64,
    ttl: Duration,
}

impl<B, S> CounterCache<B, S>
where
    B: CounterBackend,
    S: CounterSource,
{
    /// Create a counter cache sampling from the thread-local RNG.
    pub fn new(backend: Arc<B>, source: Arc<S>, config: &FeedConfig) -> Self {
        Self {
            backend,
            source,
            random: Arc::new(ThreadRngSource),
            probability: config.reconcile_probability,
            ttl: config.counter_ttl,
        }
    }

    /// Replace the random source.
    pub fn with_random_source(mut self, random: Arc<dyn UniformSource>) -> Self {
        self.random = random;
        self
    }

    pub fn probability(&self) -> f64 {
        self.probability
    }

    /// Current value of a counter.
    ///
    /// Most calls return the cached value, populating it from the
    /// denormalized field on a miss. A sampled call recounts child rows and
    /// returns the true count, repairing the stored field when it drifted.
    pub async fn get_count(&self, key: &CounterKey) -> FeedResult<i64> {
        if self.should_reconcile() {
            return self.reconcile(key).await;
        }
        self.cached_count(key).await
    }

    /// [`get_count`](Self::get_count) as a record.
    pub async fn get_record(&self, key: &CounterKey) -> FeedResult<CounterRecord> {
        Ok(CounterRecord {
            key: key.clone(),
            cached_value: self.get_count(key).await?,
        })
    }

    /// Apply a +1 for a new child row. The denormalized field must already
    /// include it.
    pub async fn incr_count(&self, key: &CounterKey) -> FeedResult<i64> {
        self.adjust(key, 1).await
    }

    /// Apply a -1 for a removed child row. The denormalized field must
    /// already exclude it.
    pub async fn decr_count(&self, key: &CounterKey) -> FeedResult<i64> {
        self.adjust(key, -1).await
    }

    /// Force a reconciliation pass regardless of sampling.
    pub async fn reconcile(&self, key: &CounterKey) -> FeedResult<i64> {
        let stored = self.source.denormalized_count(key).await?;
        let actual = self.source.count_children(key).await?;

        if stored == actual {
            debug!(counter = %key, value = actual, "counter reconciled, no drift");
            return Ok(stored);
        }

        info!(counter = %key, stored, actual, "repairing drifted counter");
        if let Err(e) = self.source.store_denormalized_count(key, actual).await {
            let err = ReconciliationError::WriteFailed {
                key: key.to_string(),
                reason: e.to_string(),
            };
            warn!(counter = %key, error = %err, "could not persist corrected counter");
        }
        self.store_cached(key, actual).await;
        Ok(actual)
    }

    fn should_reconcile(&self) -> bool {
        self.probability > 0.0 && self.random.next_unit() < self.probability
    }

    async fn cached_count(&self, key: &CounterKey) -> FeedResult<i64> {
        let cache_key = CacheKey::counter(key);
        match self.backend.get_counter(&cache_key).await {
            Ok(Some(value)) => return Ok(value),
            Ok(None) => debug!(counter = %key, "counter cache miss"),
            Err(e) => warn!(counter = %key, error = %e, "counter cache unavailable"),
        }

        let value = self.source.denormalized_count(key).await?;
        self.store_cached(key, value).await;
        Ok(value)
    }

    async fn adjust(&self, key: &CounterKey, delta: i64) -> FeedResult<i64> {
        let cache_key = CacheKey::counter(key);
        match self.backend.incr_counter_if_present(&cache_key, delta).await {
            Ok(Some(value)) => return Ok(value),
            Ok(None) => {}
            Err(e) => warn!(counter = %key, error = %e, "counter cache unavailable"),
        }

        let value = self.source.denormalized_count(key).await?;
        self.store_cached(key, value).await;
        Ok(value)
    }

    async fn store_cached(&self, key: &CounterKey, value: i64) {
        if let Err(e) = self
            .backend
            .set_counter(&CacheKey::counter(key), value, Some(self.ttl))
            .await
        {
            warn!(counter = %key, error = %e, "failed to cache counter");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryRemoteStore;
    use crate::memory_store::InMemoryFeedStore;
    use feedline_core::{CounterName, FeedItem};
    use uuid::Uuid;

    type Store = InMemoryFeedStore<FeedItem>;

    fn key() -> CounterKey {
        CounterKey::new("tweet", Uuid::now_v7(), CounterName::Likes)
    }

    type Setup = (
        CounterCache<InMemoryRemoteStore, Store>,
        Arc<InMemoryRemoteStore>,
        Arc<Store>,
    );

    fn setup(sample: f64) -> Setup {
        let remote = Arc::new(InMemoryRemoteStore::new());
        let store = Arc::new(Store::new());
        let config = FeedConfig::default().with_reconcile_probability(0.5);
        let cache = CounterCache::new(Arc::clone(&remote), Arc::clone(&store), &config)
            .with_random_source(Arc::new(ConstantSource(sample)));
        (cache, remote, store)
    }

    #[tokio::test]
    async fn test_miss_populates_from_denormalized_field() {
        let (cache, remote, store) = setup(0.9);
        let key = key();
        store.set_denormalized(&key, 12).unwrap();

        assert_eq!(cache.get_count(&key).await.unwrap(), 12);
        assert_eq!(
            remote.get_counter(&CacheKey::counter(&key)).await.unwrap(),
            Some(12)
        );

        let record = cache.get_record(&key).await.unwrap();
        assert_eq!(record.key, key);
        assert_eq!(record.cached_value, 12);
    }

    #[tokio::test]
    async fn test_unsampled_read_returns_cached_value() {
        let (cache, remote, store) = setup(0.9);
        let key = key();
        store.set_denormalized(&key, 12).unwrap();
        store.set_children(&key, 3).unwrap();
        remote
            .set_counter(&CacheKey::counter(&key), 40, None)
            .await
            .unwrap();

        assert_eq!(cache.get_count(&key).await.unwrap(), 40);
        assert_eq!(store.denormalized(&key), Some(12));
    }

    #[tokio::test]
    async fn test_sampled_read_repairs_drift() {
        let (cache, remote, store) = setup(0.1);
        let key = key();
        store.set_denormalized(&key, 12).unwrap();
        store.set_children(&key, 3).unwrap();

        assert_eq!(cache.get_count(&key).await.unwrap(), 3);
        assert_eq!(store.denormalized(&key), Some(3));
        assert_eq!(
            remote.get_counter(&CacheKey::counter(&key)).await.unwrap(),
            Some(3)
        );
    }

    #[tokio::test]
    async fn test_sampled_read_without_drift() {
        let (cache, _remote, store) = setup(0.1);
        let key = key();
        store.set_denormalized(&key, 3).unwrap();
        store.set_children(&key, 3).unwrap();

        assert_eq!(cache.get_count(&key).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_failed_repair_still_returns_true_count() {
        let (cache, _remote, store) = setup(0.1);
        let key = key();
        store.set_denormalized(&key, 12).unwrap();
        store.set_children(&key, 3).unwrap();
        store.set_read_only(true);

        assert_eq!(cache.get_count(&key).await.unwrap(), 3);
        assert_eq!(store.denormalized(&key), Some(12));
    }

    #[tokio::test]
    async fn test_zero_probability_never_reconciles() {
        let remote = Arc::new(InMemoryRemoteStore::new());
        let store = Arc::new(Store::new());
        let config = FeedConfig::default().with_reconcile_probability(0.0);
        let cache = CounterCache::new(remote, Arc::clone(&store), &config)
            .with_random_source(Arc::new(ConstantSource(0.0)));
        let key = key();
        store.set_denormalized(&key, 12).unwrap();
        store.set_children(&key, 3).unwrap();

        assert_eq!(cache.get_count(&key).await.unwrap(), 12);
    }

    #[tokio::test]
    async fn test_incr_and_decr() {
        let (cache, _remote, store) = setup(0.9);
        let key = key();

        // Absent: populate from the already-updated field.
        store.add_child(&key).unwrap();
        assert_eq!(cache.incr_count(&key).await.unwrap(), 1);

        // Present: adjust in place.
        store.add_child(&key).unwrap();
        assert_eq!(cache.incr_count(&key).await.unwrap(), 2);
        store.remove_child(&key).unwrap();
        assert_eq!(cache.decr_count(&key).await.unwrap(), 1);
        assert_eq!(cache.get_count(&key).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_cache_outage_reads_denormalized_field() {
        let (cache, remote, store) = setup(0.9);
        let key = key();
        store.set_denormalized(&key, 8).unwrap();
        remote.set_offline(true);

        assert_eq!(cache.get_count(&key).await.unwrap(), 8);
        assert_eq!(cache.incr_count(&key).await.unwrap(), 8);
    }

    #[tokio::test]
    async fn test_source_outage_propagates() {
        let (cache, _remote, store) = setup(0.9);
        store.set_offline(true);

        let err = cache.get_count(&key()).await.unwrap_err();
        assert!(err.is_authoritative_failure());
    }

    #[tokio::test]
    async fn test_huge_counter_ttl_is_accepted() {
        let remote = Arc::new(InMemoryRemoteStore::new());
        let store = Arc::new(Store::new());
        let config = FeedConfig::default()
            .with_reconcile_probability(0.0)
            .with_counter_ttl(Duration::from_secs(u64::MAX));
        assert!(config.validate().is_ok());
        let cache = CounterCache::new(remote, Arc::clone(&store), &config);
        let key = key();
        store.set_denormalized(&key, 4).unwrap();

        assert_eq!(cache.get_count(&key).await.unwrap(), 4);
        assert_eq!(cache.get_count(&key).await.unwrap(), 4);
    }

    #[test]
    fn test_seeded_source_is_reproducible() {
        let a = SeededSource::new(7);
        let b = SeededSource::new(7);
        for _ in 0..16 {
            let x = a.next_unit();
            assert_eq!(x, b.next_unit());
            assert!((0.0..1.0).contains(&x));
        }
    }
}
