//! Feedline Core - Feed Types
//!
//! Pure data structures and the stateless cursor paginator. All other crates
//! depend on this. Nothing in here talks to a store.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub mod config;
pub mod error;
pub mod pagination;

pub use config::FeedConfig;
pub use error::{
    CacheError, ConfigError, CursorError, FeedError, FeedResult, ReconciliationError,
    StorageError,
};
pub use pagination::{Cursor, CursorPaginator, CursorParams, Page, PageRequest};

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// Item identifier using UUIDv7 for timestamp-sortable IDs.
pub type ItemId = Uuid;

/// Timestamp type using UTC timezone. The sole ordering key of a feed.
pub type Timestamp = DateTime<Utc>;

/// Generate a new UUIDv7 item id.
pub fn new_item_id() -> ItemId {
    Uuid::now_v7()
}

/// Identifies one ordered list (one per feed owner, tweet, inbox, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartitionKey(String);

impl PartitionKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Partition key for an entity addressed by UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Uuid> for PartitionKey {
    fn from(id: Uuid) -> Self {
        Self::from_uuid(id)
    }
}

impl From<&str> for PartitionKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

// ============================================================================
// FEED ENTRIES
// ============================================================================

/// Anything that can live in a cached feed list.
///
/// Implementations must be `Clone`, `Serialize`, and `DeserializeOwned` so the
/// list cache can store them as opaque bytes, and `Send + Sync + 'static` for
/// async compatibility.
pub trait FeedEntry: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Unique identifier of this entry.
    fn entry_id(&self) -> ItemId;

    /// The list this entry belongs to.
    fn partition_key(&self) -> PartitionKey;

    /// Creation timestamp, used for newest-first ordering and cursors.
    fn created_at(&self) -> Timestamp;
}

/// A feed item with an opaque payload.
///
/// The cache never looks inside `payload`; counters shown next to an item are
/// kept on a different entity kind (see `CounterKey`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedItem<P = serde_json::Value> {
    pub id: ItemId,
    pub partition_key: PartitionKey,
    pub created_at: Timestamp,
    pub payload: P,
}

impl<P> FeedItem<P> {
    pub fn new(partition_key: PartitionKey, created_at: Timestamp, payload: P) -> Self {
        Self {
            id: new_item_id(),
            partition_key,
            created_at,
            payload,
        }
    }
}

impl<P> FeedEntry for FeedItem<P>
where
    P: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    fn entry_id(&self) -> ItemId {
        self.id
    }

    fn partition_key(&self) -> PartitionKey {
        self.partition_key.clone()
    }

    fn created_at(&self) -> Timestamp {
        self.created_at
    }
}

// ============================================================================
// COUNTERS
// ============================================================================

/// Denormalized counter kept on a parent entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterName {
    Likes,
    Comments,
    /// Any other child relation, named by its field.
    Other(String),
}

impl CounterName {
    /// Field name of the counter on the parent entity.
    pub fn field_name(&self) -> &str {
        match self {
            Self::Likes => "likes_count",
            Self::Comments => "comments_count",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for CounterName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field_name())
    }
}

/// Addresses one counter of one entity: `(entity kind, entity id, counter)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CounterKey {
    pub entity_kind: String,
    pub entity_id: Uuid,
    pub counter: CounterName,
}

impl CounterKey {
    pub fn new(entity_kind: impl Into<String>, entity_id: Uuid, counter: CounterName) -> Self {
        Self {
            entity_kind: entity_kind.into(),
            entity_id,
            counter,
        }
    }
}

impl fmt::Display for CounterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}:{}", self.entity_kind, self.counter, self.entity_id)
    }
}

/// Snapshot of one counter as seen by the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterRecord {
    pub key: CounterKey,
    pub cached_value: i64,
}

// ============================================================================
// TESTS
// ============================================================================
