//! Provenance wrapper for cache reads.

/// Result of a read-through, carrying where the value came from.
///
/// Callers that only want the data call [`into_value`](Self::into_value);
/// coordinators use [`was_cache_hit`](Self::was_cache_hit) to report whether
/// a page was served by the cache.
#[derive(Debug, Clone)]
pub struct CacheRead<T> {
    /// The value read.
    value: T,
    /// Whether this was a cache hit or miss.
    was_cache_hit: bool,
}

impl<T> CacheRead<T> {
    /// Create a new read from a cache hit.
    pub fn from_cache(value: T) -> Self {
        Self {
            value,
            was_cache_hit: true,
        }
    }

    /// Create a new read from an authoritative fetch (cache miss).
    pub fn from_storage(value: T) -> Self {
        Self {
            value,
            was_cache_hit: false,
        }
    }

    /// Consume the wrapper and return the underlying value.
    pub fn into_value(self) -> T {
        self.value
    }

    /// Get a reference to the underlying value.
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Check if this was a cache hit.
    pub fn was_cache_hit(&self) -> bool {
        self.was_cache_hit
    }

    /// Check if this was a cache miss (fetched from the authoritative store).
    pub fn was_cache_miss(&self) -> bool {
        !self.was_cache_hit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_read_from_cache() {
        let value = "test_value".to_string();
        let read = CacheRead::from_cache(value.clone());

        assert!(read.was_cache_hit());
        assert!(!read.was_cache_miss());
        assert_eq!(read.value(), &value);
    }

    #[test]
    fn test_cache_read_from_storage() {
        let read = CacheRead::from_storage(42i32);

        assert!(!read.was_cache_hit());
        assert!(read.was_cache_miss());
        assert_eq!(read.into_value(), 42);
    }

}
