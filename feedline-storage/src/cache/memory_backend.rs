//! In-process implementation of the remote cache store.
//!
//! Mirrors the semantics of a Redis-like server closely enough for tests and
//! the simulator: head-first lists, push-if-present, populate-if-absent and
//! integer counters with optional expiry. It can also be switched "offline"
//! to exercise the cache-unavailable paths.
//!
//! # Thread Safety
//!
//! Each trait call takes a single lock for its whole duration, which makes
//! every call atomic on its own, as the traits require. Statistics are kept
//! under a separate lock.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use feedline_core::{FeedError, FeedResult};

use super::key::CacheKey;
use super::traits::{CacheStats, CounterBackend, ListCacheBackend};

#[derive(Debug, Clone)]
struct CounterSlot {
    value: i64,
    expires_at: Option<Instant>,
}

impl CounterSlot {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// In-memory remote cache store.
///
/// # Example
///
/// ```ignore
/// use feedline_storage::cache::{CacheKey, InMemoryRemoteStore, ListCacheBackend};
///
/// let store = InMemoryRemoteStore::new();
/// let key = CacheKey::list("feed", &"42".into());
/// store.append_initial(&key, vec![b"a".to_vec()]).await?;
/// assert_eq!(store.list_len(&key), Some(1));
/// ```
#[derive(Debug, Default)]
pub struct InMemoryRemoteStore {
    lists: RwLock<HashMap<String, VecDeque<Vec<u8>>>>,
    counters: RwLock<HashMap<String, CounterSlot>>,
    stats: RwLock<CacheStats>,
    offline: AtomicBool,
}

impl InMemoryRemoteStore {
    /// Create an empty, online store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an outage: while offline every trait call fails with
    /// `CacheError::Unavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn is_offline(&self) -> bool {
        self.offline.load(Ordering::SeqCst)
    }

    /// Drop one key, as the store would on eviction.
    pub fn evict(&self, key: &CacheKey) -> bool {
        let encoded = key.encode();
        let removed_list = self
            .lists
            .write()
            .map(|mut lists| lists.remove(&encoded).is_some())
            .unwrap_or(false);
        let removed_counter = self
            .counters
            .write()
            .map(|mut counters| counters.remove(&encoded).is_some())
            .unwrap_or(false);
        if removed_list {
            self.bump(|s| s.entry_count = s.entry_count.saturating_sub(1));
        }
        removed_list || removed_counter
    }

    /// Drop every key starting with `prefix`. Returns how many were removed.
    pub fn evict_prefix(&self, prefix: &str) -> u64 {
        let mut removed = 0u64;
        if let Ok(mut lists) = self.lists.write() {
            let before = lists.len();
            lists.retain(|k, _| !k.starts_with(prefix));
            let dropped = (before - lists.len()) as u64;
            removed += dropped;
            self.bump(|s| s.entry_count = s.entry_count.saturating_sub(dropped));
        }
        if let Ok(mut counters) = self.counters.write() {
            let before = counters.len();
            counters.retain(|k, _| !k.starts_with(prefix));
            removed += (before - counters.len()) as u64;
        }
        removed
    }

    /// Length of a list, bypassing statistics and the offline switch.
    pub fn list_len(&self, key: &CacheKey) -> Option<usize> {
        self.lists
            .read()
            .ok()
            .and_then(|lists| lists.get(&key.encode()).map(VecDeque::len))
    }

    /// Overwrite the raw bytes at one list index, e.g. to plant a corrupt entry.
    pub fn overwrite_raw(&self, key: &CacheKey, index: usize, value: Vec<u8>) -> bool {
        self.lists
            .write()
            .ok()
            .and_then(|mut lists| {
                let slot = lists.get_mut(&key.encode())?.get_mut(index)?;
                *slot = value;
                Some(())
            })
            .is_some()
    }

    fn ensure_online(&self) -> FeedResult<()> {
        if self.is_offline() {
            return Err(FeedError::cache_unavailable("remote store is offline"));
        }
        Ok(())
    }

    fn read_lists(&self) -> FeedResult<RwLockReadGuard<'_, HashMap<String, VecDeque<Vec<u8>>>>> {
        self.lists
            .read()
            .map_err(|_| FeedError::cache_unavailable("list lock poisoned"))
    }

    fn write_lists(
        &self,
    ) -> FeedResult<RwLockWriteGuard<'_, HashMap<String, VecDeque<Vec<u8>>>>> {
        self.lists
            .write()
            .map_err(|_| FeedError::cache_unavailable("list lock poisoned"))
    }

    fn write_counters(&self) -> FeedResult<RwLockWriteGuard<'_, HashMap<String, CounterSlot>>> {
        self.counters
            .write()
            .map_err(|_| FeedError::cache_unavailable("counter lock poisoned"))
    }

    fn bump(&self, f: impl FnOnce(&mut CacheStats)) {
        if let Ok(mut stats) = self.stats.write() {
            f(&mut stats);
        }
    }
}

#[async_trait]
impl ListCacheBackend for InMemoryRemoteStore {
    async fn exists(&self, key: &CacheKey) -> FeedResult<bool> {
        self.ensure_online()?;
        Ok(self.read_lists()?.contains_key(&key.encode()))
    }

    async fn range(&self, key: &CacheKey) -> FeedResult<Option<Vec<Vec<u8>>>> {
        self.ensure_online()?;
        let values = self
            .read_lists()?
            .get(&key.encode())
            .map(|list| list.iter().cloned().collect::<Vec<_>>());
        match values {
            Some(_) => self.bump(|s| s.hits += 1),
            None => self.bump(|s| s.misses += 1),
        }
        Ok(values)
    }

    async fn push_front_if_present(
        &self,
        key: &CacheKey,
        value: Vec<u8>,
    ) -> FeedResult<Option<usize>> {
        self.ensure_online()?;
        let len = self.write_lists()?.get_mut(&key.encode()).map(|list| {
            list.push_front(value);
            list.len()
        });
        if len.is_some() {
            self.bump(|s| s.pushes += 1);
        }
        Ok(len)
    }

    async fn append_initial(&self, key: &CacheKey, values: Vec<Vec<u8>>) -> FeedResult<bool> {
        self.ensure_online()?;
        let created = {
            let mut lists = self.write_lists()?;
            let encoded = key.encode();
            if values.is_empty() || lists.contains_key(&encoded) {
                false
            } else {
                lists.insert(encoded, values.into_iter().collect());
                true
            }
        };
        if created {
            self.bump(|s| {
                s.populations += 1;
                s.entry_count += 1;
            });
        }
        Ok(created)
    }

    async fn stats(&self) -> FeedResult<CacheStats> {
        self.stats
            .read()
            .map(|s| s.clone())
            .map_err(|_| FeedError::cache_unavailable("stats lock poisoned"))
    }
}

#[async_trait]
impl CounterBackend for InMemoryRemoteStore {
    async fn get_counter(&self, key: &CacheKey) -> FeedResult<Option<i64>> {
        self.ensure_online()?;
        let now = Instant::now();
        let mut counters = self.write_counters()?;
        let encoded = key.encode();
        match counters.get(&encoded) {
            Some(slot) if slot.is_live(now) => Ok(Some(slot.value)),
            Some(_) => {
                counters.remove(&encoded);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set_counter(
        &self,
        key: &CacheKey,
        value: i64,
        ttl: Option<Duration>,
    ) -> FeedResult<()> {
        self.ensure_online()?;
        // A TTL past the clock's range never expires.
        let expires_at = ttl.and_then(|ttl| Instant::now().checked_add(ttl));
        self.write_counters()?
            .insert(key.encode(), CounterSlot { value, expires_at });
        Ok(())
    }

    async fn incr_counter_if_present(
        &self,
        key: &CacheKey,
        delta: i64,
    ) -> FeedResult<Option<i64>> {
        self.ensure_online()?;
        let now = Instant::now();
        let mut counters = self.write_counters()?;
        let encoded = key.encode();
        match counters.get_mut(&encoded) {
            Some(slot) if slot.is_live(now) => {
                slot.value += delta;
                Ok(Some(slot.value))
            }
            Some(_) => {
                counters.remove(&encoded);
                Ok(None)
            }
            None => Ok(None),
        }
    }
}
