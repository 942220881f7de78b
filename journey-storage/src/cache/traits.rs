//! Cache store trait.
//!
//! The service never looks a cache client up from global state; a
//! `CacheStore` is handed to it at construction.

use async_trait::async_trait;
use journey_core::CacheResult;
use std::time::Duration;

/// Key/value store holding serialized responses with a per-write TTL.
///
/// Implementations must be safe for concurrent readers and writers. A single
/// `set` must be atomic with respect to concurrent `get`s on the same key.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Whether a connection to the store is established.
    ///
    /// When this returns false the service answers with empty values and
    /// does not touch storage.
    fn is_available(&self) -> bool;

    /// Read a payload. Expired entries read as `Ok(None)`.
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Write a payload that expires `ttl` after this call.
    async fn set(&self, key: &str, value: String, ttl: Duration) -> CacheResult<()>;

    /// Get cache statistics.
    async fn stats(&self) -> CacheResult<CacheStats>;
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of reads that returned a payload.
    pub hits: u64,
    /// Number of reads that found nothing (or an expired entry).
    pub misses: u64,
    /// Number of successful writes.
    pub writes: u64,
    /// Number of entries currently stored, expired ones included until purged.
    pub entry_count: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
