//! In-memory authoritative store.
//!
//! Stands in for the relational backing store in tests and the simulator.
//! Items are held newest-first per partition; counters are modelled as a
//! denormalized field per entity plus the number of child rows it mirrors.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use feedline_core::{CounterKey, FeedEntry, FeedError, FeedResult, PartitionKey, StorageError};

use crate::source::{CounterSource, OrderedSource, RangeQuery};

/// In-memory authoritative store for feed items and counters.
#[derive(Debug)]
pub struct InMemoryFeedStore<T: FeedEntry> {
    partitions: Arc<RwLock<HashMap<PartitionKey, Vec<T>>>>,
    denormalized: Arc<RwLock<HashMap<CounterKey, i64>>>,
    children: Arc<RwLock<HashMap<CounterKey, i64>>>,
    offline: AtomicBool,
    read_only: AtomicBool,
    range_queries: AtomicU64,
}

impl<T: FeedEntry> Default for InMemoryFeedStore<T> {
    fn default() -> Self {
        Self {
            partitions: Arc::default(),
            denormalized: Arc::default(),
            children: Arc::default(),
            offline: AtomicBool::new(false),
            read_only: AtomicBool::new(false),
            range_queries: AtomicU64::new(0),
        }
    }
}

impl<T: FeedEntry> InMemoryFeedStore<T> {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Persist an item.
    ///
    /// The item is placed before every item that is not newer than it, so an
    /// item sharing a timestamp with existing ones is treated as the latest
    /// arrival.
    pub fn insert(&self, item: T) -> FeedResult<()> {
        self.ensure_writable()?;
        let mut partitions = self
            .partitions
            .write()
            .map_err(|_| lock_poisoned("partitions"))?;
        let list = partitions.entry(item.partition_key()).or_default();
        let at = list
            .iter()
            .position(|existing| existing.created_at() <= item.created_at())
            .unwrap_or(list.len());
        list.insert(at, item);
        Ok(())
    }

    /// Persist a batch of items in the given order.
    pub fn insert_all(&self, items: impl IntoIterator<Item = T>) -> FeedResult<()> {
        for item in items {
            self.insert(item)?;
        }
        Ok(())
    }

    /// Snapshot of a partition, newest-first.
    pub fn items(&self, partition: &PartitionKey) -> Vec<T> {
        self.partitions
            .read()
            .ok()
            .and_then(|p| p.get(partition).cloned())
            .unwrap_or_default()
    }

    /// Number of `fetch_range` calls served so far.
    pub fn range_query_count(&self) -> u64 {
        self.range_queries.load(Ordering::SeqCst)
    }

    /// Make every read and write fail with `StorageError::Unavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Make writes fail with `StorageError::WriteFailed` while reads succeed.
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    /// Overwrite the denormalized counter field of an entity.
    pub fn set_denormalized(&self, key: &CounterKey, value: i64) -> FeedResult<()> {
        self.denormalized
            .write()
            .map_err(|_| lock_poisoned("denormalized"))?
            .insert(key.clone(), value);
        Ok(())
    }

    /// Current denormalized value, if the entity exists.
    pub fn denormalized(&self, key: &CounterKey) -> Option<i64> {
        self.denormalized.read().ok()?.get(key).copied()
    }

    /// Set the number of child rows behind a counter.
    pub fn set_children(&self, key: &CounterKey, count: i64) -> FeedResult<()> {
        self.children
            .write()
            .map_err(|_| lock_poisoned("children"))?
            .insert(key.clone(), count);
        Ok(())
    }

    /// Record a new child row and bump the denormalized field with it, as a
    /// like/comment handler would. Returns the new denormalized value.
    pub fn add_child(&self, key: &CounterKey) -> FeedResult<i64> {
        self.adjust_child(key, 1)
    }

    /// Remove a child row and decrement the denormalized field with it.
    pub fn remove_child(&self, key: &CounterKey) -> FeedResult<i64> {
        self.adjust_child(key, -1)
    }

    fn adjust_child(&self, key: &CounterKey, delta: i64) -> FeedResult<i64> {
        self.ensure_writable()?;
        *self
            .children
            .write()
            .map_err(|_| lock_poisoned("children"))?
            .entry(key.clone())
            .or_insert(0) += delta;
        let mut denormalized = self
            .denormalized
            .write()
            .map_err(|_| lock_poisoned("denormalized"))?;
        let value = denormalized.entry(key.clone()).or_insert(0);
        *value += delta;
        Ok(*value)
    }

    fn ensure_online(&self) -> FeedResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(FeedError::storage_unavailable("backing store is offline"));
        }
        Ok(())
    }

    fn ensure_writable(&self) -> FeedResult<()> {
        self.ensure_online()?;
        if self.read_only.load(Ordering::SeqCst) {
            return Err(StorageError::WriteFailed {
                reason: "backing store is read-only".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

fn lock_poisoned(what: &str) -> FeedError {
    FeedError::storage_unavailable(format!("{what} lock poisoned"))
}

#[async_trait]
impl<T: FeedEntry> OrderedSource<T> for InMemoryFeedStore<T> {
    async fn fetch_range(
        &self,
        partition: &PartitionKey,
        query: &RangeQuery,
    ) -> FeedResult<Vec<T>> {
        self.ensure_online()?;
        self.range_queries.fetch_add(1, Ordering::SeqCst);

        let partitions = self
            .partitions
            .read()
            .map_err(|_| lock_poisoned("partitions"))?;
        let Some(items) = partitions.get(partition) else {
            return Ok(Vec::new());
        };
        let matching = items.iter().filter(|item| query.admits(item.created_at()));
        Ok(match query.limit {
            Some(limit) => matching.take(limit).cloned().collect(),
            None => matching.cloned().collect(),
        })
    }
}

#[async_trait]
impl<T: FeedEntry> CounterSource for InMemoryFeedStore<T> {
    async fn denormalized_count(&self, key: &CounterKey) -> FeedResult<i64> {
        self.ensure_online()?;
        self.denormalized(key).ok_or_else(|| {
            StorageError::NotFound {
                entity: format!("{}:{}", key.entity_kind, key.entity_id),
            }
            .into()
        })
    }

    async fn count_children(&self, key: &CounterKey) -> FeedResult<i64> {
        self.ensure_online()?;
        Ok(self
            .children
            .read()
            .map_err(|_| lock_poisoned("children"))?
            .get(key)
            .copied()
            .unwrap_or(0))
    }

    async fn store_denormalized_count(&self, key: &CounterKey, value: i64) -> FeedResult<()> {
        self.ensure_writable()?;
        self.set_denormalized(key, value)
    }
}
