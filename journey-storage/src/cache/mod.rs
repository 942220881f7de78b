//! Cache-aside storage for assembled journey responses.
//!
//! - `traits`: the `CacheStore` capability injected into the service
//! - `key`: deterministic key derivation for every read operation
//! - `memory`: in-process store with TTL expiry, used in tests and as a fallback
//! - `lmdb_backend`: persistent store backed by LMDB

mod key;
mod lmdb_backend;
mod memory;
mod traits;

pub use key::{context_key, JourneyCacheKey, JOURNEY_KEY_PREFIX};
pub use lmdb_backend::{LmdbCacheError, LmdbCacheStore};
pub use memory::InMemoryCacheStore;
pub use traits::{CacheStats, CacheStore};
