//! Opaque byte encoding of feed entries for the remote list cache.

use feedline_core::{CacheError, FeedResult};
use serde::{de::DeserializeOwned, Serialize};

/// Turns entries into the bytes stored in a remote list and back.
///
/// Implementations must be deterministic and round-trip every value they
/// accept; the cache compares nothing but relies on `decode(encode(x)) == x`.
pub trait Codec: Send + Sync + 'static {
    fn encode<T: Serialize>(&self, value: &T) -> FeedResult<Vec<u8>>;

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> FeedResult<T>;
}

/// JSON codec backed by `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> FeedResult<Vec<u8>> {
        serde_json::to_vec(value).map_err(|e| {
            CacheError::Codec {
                reason: e.to_string(),
            }
            .into()
        })
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> FeedResult<T> {
        serde_json::from_slice(bytes).map_err(|e| {
            CacheError::Codec {
                reason: e.to_string(),
            }
            .into()
        })
    }
}
