//! Read-through / write-through list cache.
//!
//! The remote store is an accelerator only. Every remote-store failure on
//! this path is logged and recovered locally: reads degrade to the
//! authoritative source, writes become no-ops. Only errors raised by the
//! [`OrderedSource`] reach the caller.

use std::sync::Arc;

use feedline_core::{
    CursorPaginator, FeedConfig, FeedEntry, FeedResult, Page, PageRequest, PartitionKey,
};
use tracing::{debug, warn};

use super::codec::{Codec, JsonCodec};
use super::key::CacheKey;
use super::read::CacheRead;
use super::traits::ListCacheBackend;
use crate::source::{OrderedSource, RangeQuery};

/// Outcome of trying to answer a page from a cached list.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheVerdict<T> {
    /// The page is trustworthy.
    Serve(Page<T>),
    /// The cached list might be a truncated prefix; re-derive the page from
    /// the authoritative source.
    FallBack,
}

impl<T> CacheVerdict<T> {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::FallBack)
    }

    /// The trusted page, if any.
    pub fn into_page(self) -> Option<Page<T>> {
        match self {
            Self::Serve(page) => Some(page),
            Self::FallBack => None,
        }
    }
}

/// Paginate a cached list and decide whether the result can be trusted.
///
/// Catch-up (`after`) pages and pages that prove a next page exists are
/// always served. Otherwise the absence of a next page is only believed when
/// the cached list is shorter than `trust_cap`.
pub fn serve_paginated_from_cache<T: FeedEntry>(
    cached: &[T],
    request: &PageRequest,
    trust_cap: usize,
) -> CacheVerdict<T> {
    let page = CursorPaginator::paginate(cached, request);

    if request.is_after() || page.has_next_page {
        return CacheVerdict::Serve(page);
    }
    if cached.len() < trust_cap {
        return CacheVerdict::Serve(page);
    }
    CacheVerdict::FallBack
}

/// Per-partition cache of newest-first item lists in a remote store.
///
/// # Example
///
/// ```ignore
/// let cache = ListCache::new(Arc::new(InMemoryRemoteStore::new()), FeedConfig::default());
/// let read = cache.read_through_list(&partition, &store).await?;
/// match cache.serve_paginated(read.value(), &PageRequest::first(20)) {
///     CacheVerdict::Serve(page) => page,
///     CacheVerdict::FallBack => /* query the store directly */,
/// };
/// ```
pub struct ListCache<B, C = JsonCodec>
where
    B: ListCacheBackend,
    C: Codec,
{
    backend: Arc<B>,
    codec: C,
    config: FeedConfig,
}

impl<B: ListCacheBackend> ListCache<B, JsonCodec> {
    /// Create a list cache storing JSON-encoded entries.
    pub fn new(backend: Arc<B>, config: FeedConfig) -> Self {
        Self::with_codec(backend, JsonCodec, config)
    }
}

impl<B, C> ListCache<B, C>
where
    B: ListCacheBackend,
    C: Codec,
{
    /// Create a list cache with a custom codec.
    pub fn with_codec(backend: Arc<B>, codec: C, config: FeedConfig) -> Self {
        Self {
            backend,
            codec,
            config,
        }
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Remote-store key of a partition's list.
    pub fn list_key(&self, partition: &PartitionKey) -> CacheKey {
        CacheKey::list(&self.config.list_namespace, partition)
    }

    /// Return the full cached list for `partition`, populating it from
    /// `source` on a miss.
    ///
    /// Population fetches the `trust_cap` newest items. A failure to write
    /// them to the remote store does not fail the read.
    pub async fn read_through_list<T, S>(
        &self,
        partition: &PartitionKey,
        source: &S,
    ) -> FeedResult<CacheRead<Vec<T>>>
    where
        T: FeedEntry,
        S: OrderedSource<T> + ?Sized,
    {
        let key = self.list_key(partition);

        if let Some(items) = self.read_cached(&key).await {
            debug!(partition = %partition, len = items.len(), "list cache hit");
            return Ok(CacheRead::from_cache(items));
        }

        debug!(partition = %partition, "list cache miss");
        let items = self.populate(&key, partition, source).await?;
        Ok(CacheRead::from_storage(items))
    }

    /// [`serve_paginated_from_cache`] using the configured trust cap.
    pub fn serve_paginated<T: FeedEntry>(
        &self,
        cached: &[T],
        request: &PageRequest,
    ) -> CacheVerdict<T> {
        let verdict = serve_paginated_from_cache(cached, request, self.config.trust_cap);
        if verdict.is_fallback() {
            debug!(
                len = cached.len(),
                trust_cap = self.config.trust_cap,
                "cached list cannot prove end of feed, falling back"
            );
        }
        verdict
    }

    /// Make a freshly persisted item visible to cached reads.
    ///
    /// Prepends the item when the partition's list is present. When it is
    /// absent, the list is populated from `source` instead, which must
    /// already contain `item`.
    pub async fn write_through_push<T, S>(&self, item: &T, source: &S) -> FeedResult<()>
    where
        T: FeedEntry,
        S: OrderedSource<T> + ?Sized,
    {
        let partition = item.partition_key();
        let key = self.list_key(&partition);

        let bytes = match self.codec.encode(item) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(partition = %partition, error = %e, "failed to encode item, skipping push");
                return Ok(());
            }
        };

        match self.backend.push_front_if_present(&key, bytes).await {
            Ok(Some(len)) => {
                debug!(partition = %partition, len, "pushed item onto cached list");
                Ok(())
            }
            Ok(None) => {
                debug!(partition = %partition, "list absent, populating instead of pushing");
                self.populate(&key, &partition, source).await.map(|_| ())
            }
            Err(e) => {
                warn!(partition = %partition, error = %e, "list cache push failed");
                Ok(())
            }
        }
    }

    /// Read and decode a present list. Any failure is logged and reported
    /// as a miss.
    async fn read_cached<T: FeedEntry>(&self, key: &CacheKey) -> Option<Vec<T>> {
        match self.backend.exists(key).await {
            Ok(true) => {}
            Ok(false) => return None,
            Err(e) => {
                warn!(key = %key.encode(), error = %e, "list cache unavailable");
                return None;
            }
        }

        let raw = match self.backend.range(key).await {
            Ok(Some(raw)) => raw,
            // Evicted between the two calls.
            Ok(None) => return None,
            Err(e) => {
                warn!(key = %key.encode(), error = %e, "list cache read failed");
                return None;
            }
        };

        let decoded: FeedResult<Vec<T>> =
            raw.iter().map(|bytes| self.codec.decode(bytes)).collect();
        match decoded {
            Ok(items) => Some(items),
            Err(e) => {
                warn!(key = %key.encode(), error = %e, "undecodable cached list");
                None
            }
        }
    }

    async fn populate<T, S>(
        &self,
        key: &CacheKey,
        partition: &PartitionKey,
        source: &S,
    ) -> FeedResult<Vec<T>>
    where
        T: FeedEntry,
        S: OrderedSource<T> + ?Sized,
    {
        let items = source
            .fetch_range(partition, &RangeQuery::latest(self.config.trust_cap))
            .await?;

        if items.is_empty() {
            return Ok(items);
        }

        let encoded: FeedResult<Vec<Vec<u8>>> =
            items.iter().map(|item| self.codec.encode(item)).collect();
        match encoded {
            Ok(values) => match self.backend.append_initial(key, values).await {
                Ok(created) => {
                    debug!(
                        partition = %partition,
                        len = items.len(),
                        created,
                        "populated list cache"
                    );
                }
                Err(e) => {
                    warn!(partition = %partition, error = %e, "list cache population failed");
                }
            },
            Err(e) => {
                warn!(partition = %partition, error = %e, "failed to encode fetched items");
            }
        }

        Ok(items)
    }
}

impl<B, C> Clone for ListCache<B, C>
where
    B: ListCacheBackend,
    C: Codec + Clone,
{
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            codec: self.codec.clone(),
            config: self.config.clone(),
        }
    }
}
