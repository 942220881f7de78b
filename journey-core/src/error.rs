//! Error types for journey operations

use crate::EntityKind;
use thiserror::Error;

/// Storage layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Storage connection unavailable")]
    Unavailable,

    #[error("Query failed for {entity_kind:?}: {reason}")]
    QueryFailed {
        entity_kind: EntityKind,
        reason: String,
    },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Cache store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache connection unavailable")]
    Unavailable,

    #[error("Cache backend error: {reason}")]
    Backend { reason: String },

    #[error("Failed to serialize cache payload for key {key}: {reason}")]
    Serialization { key: String, reason: String },

    #[error("Failed to deserialize cache payload for key {key}: {reason}")]
    Deserialization { key: String, reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to install tracing subscriber: {reason}")]
    SubscriberInit { reason: String },
}

/// Master error type for all journey errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum JourneyError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for journey operations.
pub type JourneyResult<T> = Result<T, JourneyError>;

/// Result type alias for storage gateway calls.
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type alias for cache store calls.
pub type CacheResult<T> = Result<T, CacheError>;

// =============================================================================
// TESTS
// =============================================================================
