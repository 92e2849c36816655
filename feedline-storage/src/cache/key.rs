//! Remote-store key scheme.
//!
//! `CacheKey`'s private inner representation means a key can only be built
//! through the typed constructors below, so list keys and counter keys can
//! never be mixed up or hand-formatted inconsistently.

use feedline_core::{CounterKey, CounterName, PartitionKey};
use std::fmt;
use uuid::Uuid;

/// Prefix shared by every counter key.
pub const COUNTER_PREFIX: &str = "count";

/// Separator between key segments.
const SEPARATOR: char = ':';

/// A key in the remote cache store.
///
/// # String Format
///
/// - List keys: `{namespace}:{partition}`, e.g. `feed:42`
/// - Counter keys: `count:{entity_kind}.{counter}:{entity_id}`,
///   e.g. `count:tweet.likes_count:0190...`
///
/// The namespace of a list key never equals [`COUNTER_PREFIX`] and never
/// contains the separator (enforced by `FeedConfig::validate`), so the two
/// families cannot collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Private inner data - cannot be constructed externally
    inner: KeyInner,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum KeyInner {
    List {
        namespace: String,
        partition: PartitionKey,
    },
    Counter(CounterKey),
}

impl CacheKey {
    /// Key of the cached list for one partition.
    pub fn list(namespace: &str, partition: &PartitionKey) -> Self {
        Self {
            inner: KeyInner::List {
                namespace: namespace.to_string(),
                partition: partition.clone(),
            },
        }
    }

    /// Key of one cached counter.
    pub fn counter(key: &CounterKey) -> Self {
        Self {
            inner: KeyInner::Counter(key.clone()),
        }
    }

    /// The partition, for list keys.
    pub fn partition(&self) -> Option<&PartitionKey> {
        match &self.inner {
            KeyInner::List { partition, .. } => Some(partition),
            KeyInner::Counter(_) => None,
        }
    }

    /// The counter address, for counter keys.
    pub fn counter_key(&self) -> Option<&CounterKey> {
        match &self.inner {
            KeyInner::Counter(key) => Some(key),
            KeyInner::List { .. } => None,
        }
    }

    pub fn is_counter(&self) -> bool {
        matches!(self.inner, KeyInner::Counter(_))
    }

    /// Encode to the string stored in the remote store.
    pub fn encode(&self) -> String {
        match &self.inner {
            KeyInner::List {
                namespace,
                partition,
            } => format!("{namespace}{SEPARATOR}{partition}"),
            KeyInner::Counter(key) => format!(
                "{COUNTER_PREFIX}{SEPARATOR}{}.{}{SEPARATOR}{}",
                key.entity_kind,
                key.counter.field_name(),
                key.entity_id
            ),
        }
    }

    /// Decode a key from its string form.
    ///
    /// Returns `None` if:
    /// - There is no separator, or an empty namespace/partition
    /// - A counter key lacks the `kind.counter` segment
    /// - A counter key's entity id is not a UUID
    pub fn decode(raw: &str) -> Option<Self> {
        let (head, rest) = raw.split_once(SEPARATOR)?;
        if head == COUNTER_PREFIX {
            let (kind_and_counter, id) = rest.rsplit_once(SEPARATOR)?;
            let (kind, field) = kind_and_counter.split_once('.')?;
            if kind.is_empty() || field.is_empty() {
                return None;
            }
            let entity_id = Uuid::parse_str(id).ok()?;
            return Some(Self::counter(&CounterKey::new(
                kind,
                entity_id,
                counter_from_field(field),
            )));
        }

        if head.is_empty() || rest.is_empty() {
            return None;
        }
        Some(Self::list(head, &PartitionKey::new(rest)))
    }

    /// Prefix shared by every list key in a namespace.
    pub fn list_prefix(namespace: &str) -> String {
        format!("{namespace}{SEPARATOR}")
    }

    /// Prefix shared by every counter key of one entity kind.
    pub fn counter_prefix(entity_kind: &str) -> String {
        format!("{COUNTER_PREFIX}{SEPARATOR}{entity_kind}.")
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

fn counter_from_field(field: &str) -> CounterName {
    match field {
        "likes_count" => CounterName::Likes,
        "comments_count" => CounterName::Comments,
        other => CounterName::Other(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_key_format() {
        let key = CacheKey::list("newsfeeds", &PartitionKey::new("42"));
        assert_eq!(key.encode(), "newsfeeds:42");
        assert_eq!(key.partition(), Some(&PartitionKey::new("42")));
        assert!(!key.is_counter());
    }

    #[test]
    fn test_counter_key_format() {
        let id = Uuid::nil();
        let key = CacheKey::counter(&CounterKey::new("tweet", id, CounterName::Comments));
        assert_eq!(
            key.encode(),
            "count:tweet.comments_count:00000000-0000-0000-0000-000000000000"
        );
        assert!(key.is_counter());
        assert!(key.partition().is_none());
    }

    #[test]
    fn test_partition_may_contain_separator() {
        let key = CacheKey::list("feed", &PartitionKey::new("org:7:user:3"));
        let decoded = CacheKey::decode(&key.encode()).unwrap();
        assert_eq!(decoded, key);
    }

    #[test]
    fn test_decode_rejects_malformed() {
        assert!(CacheKey::decode("noseparator").is_none());
        assert!(CacheKey::decode(":partition").is_none());
        assert!(CacheKey::decode("feed:").is_none());
        assert!(CacheKey::decode("count:tweet:not-a-uuid").is_none());
        assert!(CacheKey::decode("count:tweet.likes_count:not-a-uuid").is_none());
    }

    #[test]
    fn test_prefixes() {
        let list = CacheKey::list("feed", &PartitionKey::new("a"));
        assert!(list.encode().starts_with(&CacheKey::list_prefix("feed")));

        let counter = CacheKey::counter(&CounterKey::new("tweet", Uuid::nil(), CounterName::Likes));
        assert!(counter.encode().starts_with(&CacheKey::counter_prefix("tweet")));
        assert!(!counter.encode().starts_with(&CacheKey::counter_prefix("comment")));
    }
}
