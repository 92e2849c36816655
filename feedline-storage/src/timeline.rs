//! Timeline coordinator.
//!
//! Composes a [`ListCache`] with an [`OrderedSource`] and owns the decision
//! of whether a page is answered from the cache or re-derived from the
//! authoritative store.

use std::marker::PhantomData;
use std::sync::Arc;

use feedline_core::{
    Cursor, CursorParams, FeedEntry, FeedResult, Page, PageRequest, PartitionKey,
};
use serde::Serialize;
use tracing::debug;

use crate::cache::{CacheVerdict, Codec, JsonCodec, ListCache, ListCacheBackend};
use crate::source::{OrderedSource, RangeQuery};

/// Where a page was answered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PageSource {
    Cache,
    Authoritative,
}

/// A page plus its provenance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelinePage<T> {
    #[serde(flatten)]
    pub page: Page<T>,
    #[serde(skip)]
    pub served_from: PageSource,
}

impl<T> TimelinePage<T> {
    pub fn into_page(self) -> Page<T> {
        self.page
    }

    pub fn from_cache(&self) -> bool {
        self.served_from == PageSource::Cache
    }
}

/// Feed reads and writes for one item type.
pub struct Timeline<B, S, T, C = JsonCodec>
where
    B: ListCacheBackend,
    S: OrderedSource<T>,
    T: FeedEntry,
    C: Codec,
{
    cache: ListCache<B, C>,
    source: Arc<S>,
    _marker: PhantomData<fn() -> T>,
}

impl<B, S, T, C> Timeline<B, S, T, C>
where
    B: ListCacheBackend,
    S: OrderedSource<T>,
    T: FeedEntry,
    C: Codec,
{
    pub fn new(cache: ListCache<B, C>, source: Arc<S>) -> Self {
        Self {
            cache,
            source,
            _marker: PhantomData,
        }
    }

    pub fn cache(&self) -> &ListCache<B, C> {
        &self.cache
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Answer one page request for `partition`.
    ///
    /// The cached list is read through; if the cache cannot vouch for the
    /// page it is re-derived with [`paginate_source`](Self::paginate_source).
    pub async fn read_page(
        &self,
        partition: &PartitionKey,
        request: &PageRequest,
    ) -> FeedResult<TimelinePage<T>> {
        let cached = self
            .cache
            .read_through_list::<T, S>(partition, &*self.source)
            .await?
            .into_value();

        match self.cache.serve_paginated(&cached, request) {
            CacheVerdict::Serve(page) if !self.catch_up_truncated(&cached, request, &page) => {
                Ok(TimelinePage {
                    page,
                    served_from: PageSource::Cache,
                })
            }
            _ => {
                let page = self.paginate_source(partition, request).await?;
                Ok(TimelinePage {
                    page,
                    served_from: PageSource::Authoritative,
                })
            }
        }
    }

    /// A catch-up page that used up a list of `trust_cap` or more items may
    /// be missing whatever lies between the cursor and the oldest cached
    /// item.
    fn catch_up_truncated(&self, cached: &[T], request: &PageRequest, page: &Page<T>) -> bool {
        let truncated = request.is_after()
            && cached.len() >= self.cache.config().trust_cap
            && page.len() == cached.len();
        if truncated {
            debug!(cached = cached.len(), "catch-up page reaches past the cached list");
        }
        truncated
    }

    /// [`read_page`](Self::read_page) from raw query parameters.
    pub async fn read_page_from_params(
        &self,
        partition: &PartitionKey,
        params: &CursorParams,
    ) -> FeedResult<TimelinePage<T>> {
        let request = PageRequest::from_params(params, self.cache.config())?;
        self.read_page(partition, &request).await
    }

    /// Paginate directly against the authoritative store.
    ///
    /// `after` fetches everything newer than the cursor. Otherwise one row
    /// more than the page size is fetched to learn whether a next page
    /// exists.
    pub async fn paginate_source(
        &self,
        partition: &PartitionKey,
        request: &PageRequest,
    ) -> FeedResult<Page<T>> {
        let size = request.page_size;
        let probe = size.saturating_add(1);

        let query = match request.cursor {
            Some(Cursor::After(t)) => {
                let items = self
                    .source
                    .fetch_range(partition, &RangeQuery::newer_than(t))
                    .await?;
                return Ok(Page::new(items, false));
            }
            Some(Cursor::Before(t)) => RangeQuery::older_than(t, probe),
            None => RangeQuery::latest(probe),
        };

        let mut items = self.source.fetch_range(partition, &query).await?;
        let has_next_page = items.len() > size;
        items.truncate(size);
        debug!(partition = %partition, len = items.len(), has_next_page, "paginated from source");
        Ok(Page::new(items, has_next_page))
    }

    /// Publish an item that has just been persisted in the authoritative
    /// store.
    pub async fn publish(&self, item: &T) -> FeedResult<()> {
        self.cache
            .write_through_push(item, &*self.source)
            .await
    }
}
