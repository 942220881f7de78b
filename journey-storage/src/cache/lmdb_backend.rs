//! LMDB-backed cache store.
//!
//! Uses the heed crate (Rust bindings for LMDB) to keep assembled responses
//! in a memory-mapped file that survives process restarts.
//!
//! # Value Layout
//!
//! `[expires_at: 8 bytes, i64 LE unix millis][payload: UTF-8 JSON]`
//!
//! Expired entries read as misses and are removed by `purge_expired`.

use std::path::Path;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};
use journey_core::{CacheError, CacheResult};

use super::traits::{CacheStats, CacheStore};

const EXPIRY_PREFIX_LEN: usize = 8;

/// Error type for LMDB cache operations.
#[derive(Debug, thiserror::Error)]
pub enum LmdbCacheError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    /// Failed to open the database within the environment.
    #[error("Failed to open database: {0}")]
    DbOpen(String),

    /// Transaction error.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Stored value is shorter than its expiry prefix or not UTF-8.
    #[error("Corrupt entry: {0}")]
    CorruptEntry(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LmdbCacheError> for CacheError {
    fn from(e: LmdbCacheError) -> Self {
        CacheError::Backend {
            reason: e.to_string(),
        }
    }
}

/// LMDB-backed cache store.
///
/// # Example
///
/// ```ignore
/// use journey_storage::cache::{CacheStore, LmdbCacheStore};
///
/// let store = LmdbCacheStore::new("/var/cache/journey", 256)?;
/// store.set("journeyId:J1", payload, ttl).await?;
/// let cached = store.get("journeyId:J1").await?;
/// ```
pub struct LmdbCacheStore {
    /// The LMDB environment.
    env: Env,
    /// The main database (single unnamed database).
    db: Database<Bytes, Bytes>,
    /// Hit/miss/write counters.
    stats: RwLock<CacheStats>,
}

impl LmdbCacheStore {
    /// Open (or create) a store in `path`.
    ///
    /// # Arguments
    ///
    /// * `path` - Directory where LMDB files will be stored
    /// * `max_size_mb` - Maximum size of the database in megabytes
    pub fn new<P: AsRef<Path>>(path: P, max_size_mb: usize) -> Result<Self, LmdbCacheError> {
        std::fs::create_dir_all(&path)?;

        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(max_size_mb * 1024 * 1024)
                .max_dbs(1)
                .open(path.as_ref())
        }
        .map_err(|e| LmdbCacheError::EnvOpen(e.to_string()))?;

        let mut wtxn = env
            .write_txn()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        let db: Database<Bytes, Bytes> = env
            .create_database(&mut wtxn, None)
            .map_err(|e| LmdbCacheError::DbOpen(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        Ok(Self {
            env,
            db,
            stats: RwLock::new(CacheStats::default()),
        })
    }

    fn record(&self, update: impl FnOnce(&mut CacheStats)) {
        if let Ok(mut stats) = self.stats.write() {
            update(&mut stats);
        }
    }

    /// Remove every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> Result<u64, LmdbCacheError> {
        let now_ms = Utc::now().timestamp_millis();

        let expired: Vec<Vec<u8>> = {
            let rtxn = self
                .env
                .read_txn()
                .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;
            let iter = self
                .db
                .iter(&rtxn)
                .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

            let mut keys = Vec::new();
            for item in iter {
                let Ok((key, value)) = item else { continue };
                match decode_entry(value) {
                    Ok((expires_at, _)) if expires_at > now_ms => {}
                    _ => keys.push(key.to_vec()),
                }
            }
            keys
        };

        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        let mut deleted = 0u64;
        for key in &expired {
            if self.db.delete(&mut wtxn, key).unwrap_or(false) {
                deleted += 1;
            }
        }

        wtxn.commit()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        Ok(deleted)
    }
}

fn encode_entry(expires_at_ms: i64, payload: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(EXPIRY_PREFIX_LEN + payload.len());
    bytes.extend_from_slice(&expires_at_ms.to_le_bytes());
    bytes.extend_from_slice(payload.as_bytes());
    bytes
}

fn decode_entry(bytes: &[u8]) -> Result<(i64, &str), LmdbCacheError> {
    if bytes.len() < EXPIRY_PREFIX_LEN {
        return Err(LmdbCacheError::CorruptEntry(format!(
            "entry is {} bytes, expected at least {}",
            bytes.len(),
            EXPIRY_PREFIX_LEN
        )));
    }
    let prefix: [u8; EXPIRY_PREFIX_LEN] = bytes[..EXPIRY_PREFIX_LEN]
        .try_into()
        .map_err(|_| LmdbCacheError::CorruptEntry("invalid expiry prefix".to_string()))?;
    let payload = std::str::from_utf8(&bytes[EXPIRY_PREFIX_LEN..])
        .map_err(|e| LmdbCacheError::CorruptEntry(e.to_string()))?;
    Ok((i64::from_le_bytes(prefix), payload))
}

#[async_trait]
impl CacheStore for LmdbCacheStore {
    fn is_available(&self) -> bool {
        true
    }

    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let rtxn = self
            .env
            .read_txn()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        let found = self
            .db
            .get(&rtxn, key.as_bytes())
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        let Some(bytes) = found else {
            self.record(|s| s.misses += 1);
            return Ok(None);
        };

        let (expires_at, payload) = decode_entry(bytes)?;
        if expires_at <= Utc::now().timestamp_millis() {
            self.record(|s| s.misses += 1);
            return Ok(None);
        }

        self.record(|s| s.hits += 1);
        Ok(Some(payload.to_string()))
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> CacheResult<()> {
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let expires_at = Utc::now().timestamp_millis().saturating_add(ttl_ms);
        let bytes = encode_entry(expires_at, &value);

        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        self.db
            .put(&mut wtxn, key.as_bytes(), &bytes)
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        self.record(|s| s.writes += 1);
        Ok(())
    }

    async fn stats(&self) -> CacheResult<CacheStats> {
        let entry_count = {
            let rtxn = self
                .env
                .read_txn()
                .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;
            self.db
                .len(&rtxn)
                .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?
        };

        let mut stats = self.stats.read().map(|s| s.clone()).unwrap_or_default();
        stats.entry_count = entry_count;
        Ok(stats)
    }
}
