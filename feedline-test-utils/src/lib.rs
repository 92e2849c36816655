//! Feedline Test Utilities
//!
//! Centralized test infrastructure for the feedline workspace:
//! - Proptest generators for feeds, cursors and counters
//! - Test fixtures for common timelines
//! - Fault-injecting wrappers around the in-memory stores
//! - Custom assertions for feed-specific validation

// Re-export the in-memory stores from their source crate
pub use feedline_storage::{InMemoryFeedStore, InMemoryRemoteStore};

// Re-export core types for convenience
pub use feedline_core::{
    CounterKey, CounterName, Cursor, FeedConfig, FeedEntry, FeedError, FeedItem, FeedResult,
    Page, PageRequest, PartitionKey, Timestamp,
};

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use feedline_storage::{ListCache, OrderedSource, RangeQuery, Timeline, UniformSource};

/// Item type used throughout the tests: the payload is the item's position
/// in its fixture feed, 0 being the newest.
pub type TestItem = FeedItem<u32>;

/// Timeline over the in-memory stores.
pub type TestTimeline = Timeline<InMemoryRemoteStore, InMemoryFeedStore<TestItem>, TestItem>;

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for feed types.

    use super::*;
    use proptest::prelude::*;

    /// Generate a newest-first feed of up to `max_len` items.
    ///
    /// Gaps between neighbours are 0 to 3 seconds, so ties on `created_at`
    /// occur regularly.
    pub fn arb_feed(max_len: usize) -> impl Strategy<Value = Vec<TestItem>> {
        prop::collection::vec(0i64..4, 0..=max_len).prop_map(|gaps| {
            let mut at = fixtures::base_time();
            gaps.iter()
                .enumerate()
                .map(|(i, gap)| {
                    at -= Duration::seconds(*gap);
                    FeedItem::new(fixtures::partition(), at, i as u32)
                })
                .collect()
        })
    }

    /// Generate a cursor near the fixture time range.
    pub fn arb_cursor() -> impl Strategy<Value = Cursor> {
        (any::<bool>(), 0i64..400).prop_map(|(after, back)| {
            let t = fixtures::base_time() - Duration::seconds(back);
            if after {
                Cursor::After(t)
            } else {
                Cursor::Before(t)
            }
        })
    }

    /// Generate a counter key on a random entity.
    pub fn arb_counter_key() -> impl Strategy<Value = CounterKey> {
        (
            prop_oneof![Just("tweet"), Just("comment"), Just("post")],
            any::<[u8; 16]>().prop_map(Uuid::from_bytes),
            prop_oneof![
                Just(CounterName::Likes),
                Just(CounterName::Comments),
                "[a-z_]{1,16}_count".prop_map(CounterName::Other),
            ],
        )
            .prop_map(|(kind, id, counter)| CounterKey::new(kind, id, counter))
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built feeds and timelines.

    use super::*;

    /// Timestamp of item 0 in every fixture feed.
    pub fn base_time() -> Timestamp {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0)
            .single()
            .unwrap_or_else(Utc::now)
    }

    /// The partition every fixture item belongs to.
    pub fn partition() -> PartitionKey {
        PartitionKey::new("owner-1")
    }

    /// `n` items, newest-first, one second apart. Item `i` has payload `i`.
    pub fn feed(n: u32) -> Vec<TestItem> {
        (0..n)
            .map(|i| FeedItem::new(partition(), base_time() - Duration::seconds(i64::from(i)), i))
            .collect()
    }

    /// An item newer than every item of [`feed`].
    pub fn fresh_item(payload: u32, seconds_ahead: i64) -> TestItem {
        FeedItem::new(partition(), base_time() + Duration::seconds(seconds_ahead), payload)
    }

    /// Authoritative store holding [`feed`]`(n)`.
    pub fn seeded_store(n: u32) -> Arc<InMemoryFeedStore<TestItem>> {
        let store = InMemoryFeedStore::new();
        for item in feed(n).into_iter().rev() {
            if let Err(e) = store.insert(item) {
                panic!("seeding fixture store failed: {e}");
            }
        }
        Arc::new(store)
    }

    /// Timeline with an empty remote cache over [`seeded_store`]`(n)`.
    pub fn timeline(n: u32, config: FeedConfig) -> TestTimeline {
        timeline_over(seeded_store(n), config)
    }

    /// Timeline with an empty remote cache over an existing store.
    pub fn timeline_over(
        store: Arc<InMemoryFeedStore<TestItem>>,
        config: FeedConfig,
    ) -> TestTimeline {
        let cache = ListCache::new(Arc::new(InMemoryRemoteStore::new()), config);
        Timeline::new(cache, store)
    }

    /// Likes counter on a fresh entity.
    pub fn likes_key() -> CounterKey {
        CounterKey::new("tweet", Uuid::now_v7(), CounterName::Likes)
    }
}

// ============================================================================
// FAULT INJECTION
// ============================================================================

pub mod faults {
    //! Wrappers that make stores misbehave on demand.

    use super::*;

    /// Ordered source that fails a configurable number of upcoming calls
    /// with `StorageError::Unavailable` before delegating again.
    #[derive(Debug)]
    pub struct FlakySource<S> {
        inner: Arc<S>,
        failures_left: AtomicUsize,
        calls: AtomicUsize,
    }

    impl<S> FlakySource<S> {
        pub fn new(inner: Arc<S>) -> Self {
            Self {
                inner,
                failures_left: AtomicUsize::new(0),
                calls: AtomicUsize::new(0),
            }
        }

        /// Fail the next `n` calls.
        pub fn fail_next(&self, n: usize) {
            self.failures_left.store(n, Ordering::SeqCst);
        }

        /// Total calls seen, failed or not.
        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl<T, S> OrderedSource<T> for FlakySource<S>
    where
        T: FeedEntry,
        S: OrderedSource<T>,
    {
        async fn fetch_range(
            &self,
            partition: &PartitionKey,
            query: &RangeQuery,
        ) -> FeedResult<Vec<T>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let failing = self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failing {
                return Err(FeedError::storage_unavailable("injected failure"));
            }
            self.inner.fetch_range(partition, query).await
        }
    }

    /// Uniform source replaying a fixed script of samples, cycling when
    /// exhausted.
    #[derive(Debug)]
    pub struct ScriptedRandom {
        samples: Vec<f64>,
        next: Mutex<usize>,
    }

    impl ScriptedRandom {
        pub fn new(samples: Vec<f64>) -> Self {
            Self {
                samples,
                next: Mutex::new(0),
            }
        }
    }

    impl UniformSource for ScriptedRandom {
        fn next_unit(&self) -> f64 {
            if self.samples.is_empty() {
                return 1.0;
            }
            let mut next = match self.next.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            let sample = self.samples[*next % self.samples.len()];
            *next += 1;
            sample
        }
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for feed-specific validation.

    use super::*;

    /// Assert that a sequence is ordered newest-first.
    #[track_caller]
    pub fn assert_newest_first<T: FeedEntry>(items: &[T]) {
        for pair in items.windows(2) {
            assert!(
                pair[0].created_at() >= pair[1].created_at(),
                "items out of order: {} before {}",
                pair[0].created_at(),
                pair[1].created_at()
            );
        }
    }

    /// Assert a page of fixture items by payloads and next-page flag.
    #[track_caller]
    pub fn assert_page(page: &Page<TestItem>, payloads: &[u32], has_next_page: bool) {
        let got: Vec<u32> = page.items.iter().map(|i| i.payload).collect();
        assert_eq!(got, payloads, "unexpected page items");
        assert_eq!(page.has_next_page, has_next_page, "unexpected has_next_page");
    }

    /// Assert that a result failed in the authoritative layer.
    #[track_caller]
    pub fn assert_authoritative_failure<T: std::fmt::Debug>(result: &FeedResult<T>) {
        match result {
            Err(e) if e.is_authoritative_failure() => {}
            other => panic!("Expected authoritative failure, got: {:?}", other),
        }
    }

    /// Assert that a result is a cursor error.
    #[track_caller]
    pub fn assert_cursor_error<T: std::fmt::Debug>(result: &FeedResult<T>) {
        match result {
            Err(FeedError::Cursor(_)) => {}
            other => panic!("Expected Cursor error, got: {:?}", other),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
