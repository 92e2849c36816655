//! Remote list and counter cache.
//!
//! The remote store is never the source of truth. Reads return
//! [`CacheRead<T>`], which records whether the data came from the cache or
//! from the authoritative store, and every cache failure degrades to the
//! authoritative path.
//!
//! # Key Scheme
//!
//! [`CacheKey`] can only be built through typed constructors, so list keys
//! and counter keys cannot be hand-formatted or confused with each other.
//!
//! # Trust Cap
//!
//! Lists are populated with at most `trust_cap` items but are never trimmed
//! afterwards. A cached list at or above that length may be a truncated
//! prefix, so it is only believed when it can prove a next page exists. The
//! same holds for a catch-up page that used up the whole list; the
//! [`Timeline`](crate::Timeline) coordinator re-reads those from the store.
//!
//! # Example
//!
//! ```ignore
//! let cache = ListCache::new(Arc::new(InMemoryRemoteStore::new()), config);
//! let read = cache.read_through_list(&partition, &store).await?;
//! if read.was_cache_hit() {
//!     tracing::debug!("served from cache");
//! }
//! ```

pub mod codec;
pub mod key;
pub mod list_cache;
pub mod memory_backend;
pub mod read;
pub mod traits;

pub use codec::{Codec, JsonCodec};
pub use key::{CacheKey, COUNTER_PREFIX};
pub use list_cache::{serve_paginated_from_cache, CacheVerdict, ListCache};
pub use memory_backend::InMemoryRemoteStore;
pub use read::CacheRead;
pub use traits::{CacheStats, CounterBackend, ListCacheBackend};
