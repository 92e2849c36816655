//! Cursor-based ("endless") pagination over newest-first sequences.
//!
//! The paginator does not care where the sequence came from: a cached list
//! or a freshly queried slice of the authoritative store are treated alike.
//! Deciding whether a page computed from the cache can be trusted is the
//! list cache's job, not this module's.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{CursorError, FeedConfig, FeedEntry, FeedResult, Timestamp};

/// Query parameter carrying the "newer than" cursor.
pub const AFTER_PARAM: &str = "created_at__gt";

/// Query parameter carrying the "older than" cursor.
pub const BEFORE_PARAM: &str = "created_at__lt";

/// Offset-less ISO 8601 layouts accepted for cursors, read as UTC.
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Query parameter carrying the requested page size.
pub const SIZE_PARAM: &str = "size";

/// Position in a newest-first feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cursor {
    /// Everything strictly newer than the timestamp, unbounded in count.
    After(Timestamp),
    /// Up to one page strictly older than the timestamp.
    Before(Timestamp),
}

impl Cursor {
    /// True for catch-up (`after`) cursors.
    pub fn is_after(&self) -> bool {
        matches!(self, Self::After(_))
    }

    /// Parse an ISO 8601 timestamp for the given query parameter.
    ///
    /// RFC 3339 values keep their offset. Values without an offset, including
    /// a bare date, are taken as UTC.
    pub fn parse_timestamp(param: &str, value: &str) -> Result<Timestamp, CursorError> {
        let raw = value.trim();
        let rfc3339 = match DateTime::parse_from_rfc3339(raw) {
            Ok(t) => return Ok(t.with_timezone(&Utc)),
            Err(e) => e,
        };

        let naive = NAIVE_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
            .or_else(|| {
                NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                    .ok()
                    .and_then(|date| date.and_hms_opt(0, 0, 0))
            });

        naive
            .map(|t| t.and_utc())
            .ok_or_else(|| CursorError::MalformedTimestamp {
                param: param.to_string(),
                value: value.to_string(),
                reason: rfc3339.to_string(),
            })
    }
}

/// Raw cursor parameters as they arrive on the query string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorParams {
    #[serde(rename = "created_at__gt", default)]
    pub after: Option<String>,
    #[serde(rename = "created_at__lt", default)]
    pub before: Option<String>,
    #[serde(rename = "size", default)]
    pub size: Option<String>,
}

/// A validated pagination request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// `None` means "first page", i.e. `before(+infinity)`.
    pub cursor: Option<Cursor>,
    pub page_size: usize,
}

impl PageRequest {
    /// First page with the given size.
    pub fn first(page_size: usize) -> Self {
        Self {
            cursor: None,
            page_size,
        }
    }

    pub fn after(t: Timestamp, page_size: usize) -> Self {
        Self {
            cursor: Some(Cursor::After(t)),
            page_size,
        }
    }

    pub fn before(t: Timestamp, page_size: usize) -> Self {
        Self {
            cursor: Some(Cursor::Before(t)),
            page_size,
        }
    }

    /// True when this request is a catch-up (`after`) query.
    pub fn is_after(&self) -> bool {
        self.cursor.is_some_and(|c| c.is_after())
    }

    /// Build a request from raw query parameters.
    ///
    /// `after` wins when both cursors are present; the `before` value is then
    /// not looked at. A missing size uses the configured default, an oversize
    /// one is clamped to the maximum. Unparsable timestamps and sizes are
    /// rejected.
    pub fn from_params(params: &CursorParams, config: &FeedConfig) -> FeedResult<Self> {
        let page_size = match params.size.as_deref() {
            None => config.default_page_size,
            Some(raw) => {
                let requested = parse_page_size(raw)?;
                if requested > config.max_page_size {
                    tracing::debug!(
                        requested,
                        max = config.max_page_size,
                        "clamping requested page size"
                    );
                }
                requested.min(config.max_page_size)
            }
        };

        let cursor = if let Some(after) = params.after.as_deref() {
            Some(Cursor::After(Cursor::parse_timestamp(AFTER_PARAM, after)?))
        } else if let Some(before) = params.before.as_deref() {
            Some(Cursor::Before(Cursor::parse_timestamp(BEFORE_PARAM, before)?))
        } else {
            None
        };

        Ok(Self { cursor, page_size })
    }
}

fn parse_page_size(raw: &str) -> Result<usize, CursorError> {
    let size = raw
        .trim()
        .parse::<usize>()
        .map_err(|e| CursorError::InvalidPageSize {
            value: raw.to_string(),
            reason: e.to_string(),
        })?;
    if size == 0 {
        return Err(CursorError::InvalidPageSize {
            value: raw.to_string(),
            reason: "page size must be at least 1".to_string(),
        });
    }
    Ok(size)
}

/// One page of a feed, serialized as `{"has_next_page": .., "results": [..]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub has_next_page: bool,
    #[serde(rename = "results")]
    pub items: Vec<T>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, has_next_page: bool) -> Self {
        Self {
            has_next_page,
            items,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), false)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Map the items to a new type, keeping the paging flag.
    pub fn map<U, F>(self, f: F) -> Page<U>
    where
        F: FnMut(T) -> U,
    {
        Page {
            has_next_page: self.has_next_page,
            items: self.items.into_iter().map(f).collect(),
        }
    }
}

/// Stateless slicer for newest-first sequences.
#[derive(Debug, Clone, Copy, Default)]
pub struct CursorPaginator;

impl CursorPaginator {
    /// Slice `ordered` (newest-first) according to `request`.
    ///
    /// - `after(t)`: the maximal prefix with `created_at > t`; no page-size
    ///   limit and `has_next_page` is always false.
    /// - `before(t)` / first page: starting at the first item older than `t`,
    ///   up to `page_size` items; `has_next_page` iff more qualifying items
    ///   remain past the page.
    pub fn paginate<T: FeedEntry>(ordered: &[T], request: &PageRequest) -> Page<T> {
        match request.cursor {
            Some(Cursor::After(t)) => {
                let items = ordered
                    .iter()
                    .take_while(|item| item.created_at() > t)
                    .cloned()
                    .collect();
                Page::new(items, false)
            }
            Some(Cursor::Before(t)) => {
                match ordered.iter().position(|item| item.created_at() < t) {
                    Some(start) => Self::window(ordered, start, request.page_size),
                    None => Page::empty(),
                }
            }
            None => Self::window(ordered, 0, request.page_size),
        }
    }

    fn window<T: Clone>(ordered: &[T], start: usize, page_size: usize) -> Page<T> {
        let end = start.saturating_add(page_size).min(ordered.len());
        let has_next_page = ordered.len() > start.saturating_add(page_size);
        Page::new(ordered[start..end].to_vec(), has_next_page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FeedItem, PartitionKey};
    use chrono::{Duration, TimeZone};

    fn base() -> Timestamp {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    /// `n` items, newest-first, one minute apart; item 0 is the newest.
    fn feed(n: i64) -> Vec<FeedItem<i64>> {
        (0..n)
            .map(|i| FeedItem::new(PartitionKey::new("p"), base() - Duration::minutes(i), i))
            .collect()
    }

    fn payloads(page: &Page<FeedItem<i64>>) -> Vec<i64> {
        page.items.iter().map(|i| i.payload).collect()
    }

    #[test]
    fn test_empty_sequence() {
        let empty: Vec<FeedItem<i64>> = Vec::new();
        for request in [
            PageRequest::first(20),
            PageRequest::before(base(), 20),
            PageRequest::after(base(), 20),
        ] {
            let page = CursorPaginator::paginate(&empty, &request);
            assert!(page.is_empty());
            assert!(!page.has_next_page);
        }
    }

    #[test]
    fn test_first_page() {
        let items = feed(25);
        let page = CursorPaginator::paginate(&items, &PageRequest::first(20));
        assert_eq!(page.len(), 20);
        assert!(page.has_next_page);
        assert_eq!(payloads(&page), (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn test_exact_page_has_no_next() {
        let items = feed(20);
        let page = CursorPaginator::paginate(&items, &PageRequest::first(20));
        assert_eq!(page.len(), 20);
        assert!(!page.has_next_page);
    }

    #[test]
    fn test_before_cursor_continues_after_boundary() {
        let items = feed(25);
        let cursor = items[19].created_at;
        let page = CursorPaginator::paginate(&items, &PageRequest::before(cursor, 20));
        assert_eq!(payloads(&page), (20..25).collect::<Vec<_>>());
        assert!(!page.has_next_page);
    }

    #[test]
    fn test_before_cursor_newer_than_everything_is_full_window() {
        let items = feed(3);
        let page = CursorPaginator::paginate(
            &items,
            &PageRequest::before(base() + Duration::hours(1), 20),
        );
        assert_eq!(page.len(), 3);
    }

    #[test]
    fn test_before_cursor_older_than_everything_is_empty() {
        let items = feed(3);
        let page = CursorPaginator::paginate(&items, &PageRequest::before(items[2].created_at, 20));
        assert!(page.is_empty());
        assert!(!page.has_next_page);
    }

    #[test]
    fn test_after_cursor_is_unbounded() {
        let items = feed(50);
        let page = CursorPaginator::paginate(&items, &PageRequest::after(items[40].created_at, 5));
        assert_eq!(page.len(), 40);
        assert!(!page.has_next_page);
    }

    #[test]
    fn test_after_newest_timestamp_is_empty() {
        let items = feed(5);
        let page = CursorPaginator::paginate(&items, &PageRequest::after(items[0].created_at, 20));
        assert!(page.is_empty());
        assert!(!page.has_next_page);
    }

    #[test]
    fn test_after_older_than_everything_returns_all() {
        let items = feed(5);
        let page = CursorPaginator::paginate(
            &items,
            &PageRequest::after(base() - Duration::days(1), 20),
        );
        assert_eq!(page.len(), 5);
    }

    #[test]
    fn test_from_params_defaults_and_clamps() {
        let config = FeedConfig::default();

        let request = PageRequest::from_params(&CursorParams::default(), &config).unwrap();
        assert_eq!(request, PageRequest::first(20));

        let params = CursorParams {
            size: Some("5000".to_string()),
            ..Default::default()
        };
        let request = PageRequest::from_params(&params, &config).unwrap();
        assert_eq!(request.page_size, config.max_page_size);
    }

    #[test]
    fn test_from_params_after_takes_precedence() {
        let params = CursorParams {
            after: Some("2024-01-01T00:00:00Z".to_string()),
            before: Some("2023-01-01T00:00:00Z".to_string()),
            size: None,
        };
        let request = PageRequest::from_params(&params, &FeedConfig::default()).unwrap();
        assert_eq!(request.cursor, Some(Cursor::After(base())));
        assert!(request.is_after());
    }

    #[test]
    fn test_from_params_rejects_malformed_cursor() {
        let params = CursorParams {
            before: Some("not-a-date".to_string()),
            ..Default::default()
        };
        let err = PageRequest::from_params(&params, &FeedConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            crate::FeedError::Cursor(CursorError::MalformedTimestamp { ref param, .. })
                if param == BEFORE_PARAM
        ));
    }

    #[test]
    fn test_offsetless_cursor_is_utc() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 5, 10, 30, 0).unwrap();
        for raw in ["2024-03-05T10:30:00", "2024-03-05 10:30:00", "2024-03-05T10:30:00.000"] {
            assert_eq!(Cursor::parse_timestamp(BEFORE_PARAM, raw).unwrap(), expected);
        }
        assert_eq!(
            Cursor::parse_timestamp(AFTER_PARAM, "2024-03-05").unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 5, 0, 0, 0).unwrap()
        );
        assert_eq!(
            Cursor::parse_timestamp(AFTER_PARAM, "2024-03-05T12:30:00+02:00").unwrap(),
            expected
        );
        assert!(Cursor::parse_timestamp(AFTER_PARAM, "2024-13-05").is_err());
    }

    #[test]
    fn test_from_params_rejects_bad_size() {
        for raw in ["0", "-3", "ten"] {
            let params = CursorParams {
                size: Some(raw.to_string()),
                ..Default::default()
            };
            let err = PageRequest::from_params(&params, &FeedConfig::default()).unwrap_err();
            assert!(matches!(
                err,
                crate::FeedError::Cursor(CursorError::InvalidPageSize { .. })
            ));
        }
    }

    #[test]
    fn test_params_deserialize_from_query_names() {
        let params: CursorParams =
            serde_json::from_str(r#"{"created_at__lt": "2024-01-01T00:00:00+00:00", "size": "3"}"#)
                .unwrap();
        assert_eq!(params.before.as_deref(), Some("2024-01-01T00:00:00+00:00"));
        assert_eq!(params.size.as_deref(), Some("3"));
        assert!(params.after.is_none());
    }

    #[test]
    fn test_page_serializes_as_results() {
        let page = Page::new(vec![1, 2], true);
        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json, serde_json::json!({"has_next_page": true, "results": [1, 2]}));
    }
}
