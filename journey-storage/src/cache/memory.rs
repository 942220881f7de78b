//! In-memory cache store with TTL expiry.
//!
//! Entries live in a `DashMap`, so no lock guard is held across an await.
//! Expiry uses `tokio::time::Instant`, so tests can drive it with a paused
//! clock.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use journey_core::{CacheError, CacheResult};
use tokio::time::Instant;

use super::traits::{CacheStats, CacheStore};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    ttl: Duration,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Process-local cache store.
///
/// Besides the `CacheStore` contract it exposes switches to simulate an
/// unreachable server and failing reads or writes.
#[derive(Debug)]
pub struct InMemoryCacheStore {
    entries: DashMap<String, Entry>,
    available: AtomicBool,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
}

impl Default for InMemoryCacheStore {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
            available: AtomicBool::new(true),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            writes: AtomicU64::new(0),
        }
    }
}

impl InMemoryCacheStore {
    /// Create a new, connected, empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the connection going away (or coming back).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Make every `get` fail with a backend error.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every `set` fail with a backend error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Whether a live (unexpired) entry exists for `key`.
    pub async fn contains_key(&self, key: &str) -> bool {
        let now = Instant::now();
        self.entries.get(key).is_some_and(|e| e.is_live(now))
    }

    /// TTL the entry under `key` was written with.
    pub async fn ttl_of(&self, key: &str) -> Option<Duration> {
        self.entries.get(key).map(|e| e.ttl)
    }

    /// Raw payload under `key`, ignoring expiry and statistics.
    pub async fn raw(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|e| e.value.clone())
    }

    /// Number of stored entries, expired ones included.
    pub async fn len(&self) -> usize {
        self.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop expired entries, returning how many were removed.
    pub async fn purge_expired(&self) -> u64 {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, e| e.is_live(now));
        before.saturating_sub(self.entries.len()) as u64
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        if !self.is_available() {
            return Err(CacheError::Unavailable);
        }
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(CacheError::Backend {
                reason: "simulated read failure".to_string(),
            });
        }

        let now = Instant::now();
        let value = self
            .entries
            .get(key)
            .filter(|e| e.is_live(now))
            .map(|e| e.value.clone());

        if value.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        Ok(value)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> CacheResult<()> {
        if !self.is_available() {
            return Err(CacheError::Unavailable);
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CacheError::Backend {
                reason: "simulated write failure".to_string(),
            });
        }

        let expires_at = Instant::now()
            .checked_add(ttl)
            .ok_or_else(|| CacheError::Backend {
                reason: format!("ttl {:?} out of range", ttl),
            })?;
        let entry = Entry {
            value,
            ttl,
            expires_at,
        };
        self.entries.insert(key.to_string(), entry);
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn stats(&self) -> CacheResult<CacheStats> {
        Ok(CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            entry_count: self.entries.len() as u64,
        })
    }
}
