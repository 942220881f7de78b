//! Configuration types

use crate::{ConfigError, JourneyError, JourneyResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Fixed time-to-live for cached journey responses: five days.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60 * 5);

/// Largest TTL `validate` accepts: one year.
pub const MAX_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60 * 365);

/// Rule used to pick the one authoritative version of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ActivePolicy {
    /// Only versions flagged active are candidates; the highest version
    /// number wins, then the highest row id. No flagged version means the
    /// entity resolves to nothing.
    #[default]
    FlaggedActive,
    /// The highest version number wins regardless of the active flag.
    LatestVersion,
}

impl ActivePolicy {
    /// Parse the policy name used in `JOURNEY_ACTIVE_POLICY`.
    pub fn parse(value: &str) -> JourneyResult<Self> {
        match value.trim().to_lowercase().as_str() {
            "flagged" | "flagged_active" => Ok(Self::FlaggedActive),
            "latest" | "latest_version" => Ok(Self::LatestVersion),
            other => Err(JourneyError::Config(ConfigError::InvalidValue {
                field: "active_policy".to_string(),
                value: other.to_string(),
                reason: "expected one of: flagged, latest".to_string(),
            })),
        }
    }
}

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JourneyConfig {
    /// TTL applied to every cache write.
    pub cache_ttl: Duration,
    /// How the active version of an entity is chosen.
    pub active_policy: ActivePolicy,
    /// Collapse concurrent misses on the same key into one resolution.
    pub single_flight: bool,
}

impl Default for JourneyConfig {
    fn default() -> Self {
        Self {
            cache_ttl: DEFAULT_CACHE_TTL,
            active_policy: ActivePolicy::default(),
            single_flight: true,
        }
    }
}

impl JourneyConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the cache TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Set the active version policy.
    pub fn with_active_policy(mut self, policy: ActivePolicy) -> Self {
        self.active_policy = policy;
        self
    }

    /// Enable or disable the single-flight guard.
    pub fn with_single_flight(mut self, enabled: bool) -> Self {
        self.single_flight = enabled;
        self
    }

    /// Build a config from environment variables.
    ///
    /// Environment variables:
    /// - `JOURNEY_CACHE_TTL_SECS`: TTL for cache writes (default: 432000)
    /// - `JOURNEY_ACTIVE_POLICY`: "flagged" or "latest" (default: flagged)
    /// - `JOURNEY_SINGLE_FLIGHT`: "true" or "false" (default: true)
    ///
    /// Unparseable numbers fall back to the default; an unknown policy name
    /// is an error.
    pub fn from_env() -> JourneyResult<Self> {
        let cache_ttl = std::env::var("JOURNEY_CACHE_TTL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_CACHE_TTL);

        let active_policy = match std::env::var("JOURNEY_ACTIVE_POLICY") {
            Ok(value) => ActivePolicy::parse(&value)?,
            Err(_) => ActivePolicy::default(),
        };

        let single_flight = std::env::var("JOURNEY_SINGLE_FLIGHT")
            .ok()
            .map(|s| s.to_lowercase() != "false")
            .unwrap_or(true);

        let config = Self {
            cache_ttl,
            active_policy,
            single_flight,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> JourneyResult<()> {
        if self.cache_ttl.is_zero() {
            return Err(JourneyError::Config(ConfigError::InvalidValue {
                field: "cache_ttl".to_string(),
                value: format!("{:?}", self.cache_ttl),
                reason: "cache_ttl must be positive".to_string(),
            }));
        }
        if self.cache_ttl > MAX_CACHE_TTL {
            return Err(JourneyError::Config(ConfigError::InvalidValue {
                field: "cache_ttl".to_string(),
                value: format!("{:?}", self.cache_ttl),
                reason: format!("cache_ttl must not exceed {}s", MAX_CACHE_TTL.as_secs()),
            }));
        }
        Ok(())
    }
}
