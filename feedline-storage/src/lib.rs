//! Feedline Storage - Feed Cache Layer
//!
//! Remote list and counter caching in front of an authoritative feed store.
//! The authoritative store is abstracted by [`OrderedSource`] and
//! [`CounterSource`]; the remote cache by [`ListCacheBackend`] and
//! [`CounterBackend`]. In-memory implementations of both sides are provided
//! for tests and simulation.

pub mod cache;
pub mod counter;
pub mod memory_store;
pub mod source;
pub mod timeline;

pub use cache::{
    serve_paginated_from_cache, CacheKey, CacheRead, CacheStats, CacheVerdict, Codec,
    CounterBackend, InMemoryRemoteStore, JsonCodec, ListCache, ListCacheBackend,
};
pub use counter::{ConstantSource, CounterCache, SeededSource, ThreadRngSource, UniformSource};
pub use memory_store::InMemoryFeedStore;
pub use source::{CounterSource, OrderedSource, RangeQuery, TimeBound};
pub use timeline::{PageSource, Timeline, TimelinePage};
