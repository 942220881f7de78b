//! Tracing subscriber setup.
//!
//! The engine only emits `tracing` events; binaries embedding it call
//! `init_tracing` once at startup to install a subscriber.

use journey_core::{ConfigError, JourneyError, JourneyResult};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "journey_engine=info,journey_storage=info,warn";

/// Output format of the fmt layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per event.
    #[default]
    Json,
    /// Human-readable multi-line output.
    Pretty,
}

impl LogFormat {
    /// Parse the value of `JOURNEY_LOG_FORMAT`.
    pub fn parse(value: &str) -> JourneyResult<Self> {
        match value.trim().to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" | "text" => Ok(Self::Pretty),
            other => Err(JourneyError::Config(ConfigError::InvalidValue {
                field: "log_format".to_string(),
                value: other.to_string(),
                reason: "expected one of: json, pretty".to_string(),
            })),
        }
    }
}

/// Telemetry configuration from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    pub format: LogFormat,
    /// `EnvFilter` directives, e.g. `journey_engine=debug,info`.
    pub filter: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            format: std::env::var("JOURNEY_LOG_FORMAT")
                .ok()
                .and_then(|s| LogFormat::parse(&s).ok())
                .unwrap_or_default(),
            filter: std::env::var("JOURNEY_LOG_FILTER")
                .or_else(|_| std::env::var("RUST_LOG"))
                .unwrap_or_else(|_| DEFAULT_FILTER.to_string()),
        }
    }
}

impl TelemetryConfig {
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    /// Build the `EnvFilter` for this config.
    pub fn env_filter(&self) -> JourneyResult<EnvFilter> {
        EnvFilter::try_new(&self.filter).map_err(|e| {
            JourneyError::Config(ConfigError::InvalidValue {
                field: "log_filter".to_string(),
                value: self.filter.clone(),
                reason: e.to_string(),
            })
        })
    }
}

/// Install the global tracing subscriber.
///
/// Fails if the filter does not parse or a global subscriber is already set.
pub fn init_tracing(config: &TelemetryConfig) -> JourneyResult<()> {
    let env_filter = config.env_filter()?;
    let registry = tracing_subscriber::registry().with(env_filter);

    let result = match config.format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).try_init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer().pretty()).try_init(),
    };
    result.map_err(|e| {
        JourneyError::Config(ConfigError::SubscriberInit {
            reason: e.to_string(),
        })
    })?;

    tracing::info!(format = ?config.format, filter = %config.filter, "Tracing initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EnvVarGuard {
        key: &'static str,
        original: Option<String>,
    }

    impl EnvVarGuard {
        fn set(key: &'static str, value: Option<&str>) -> Self {
            let original = std::env::var(key).ok();
            match value {
                Some(v) => std::env::set_var(key, v),
                None => std::env::remove_var(key),
            }
            Self { key, original }
        }
    }

    impl Drop for EnvVarGuard {
        fn drop(&mut self) {
            match self.original.as_deref() {
                Some(v) => std::env::set_var(self.key, v),
                None => std::env::remove_var(self.key),
            }
        }
    }

    #[test]
    fn test_telemetry_config_from_env() {
        {
            let _format = EnvVarGuard::set("JOURNEY_LOG_FORMAT", None);
            let _filter = EnvVarGuard::set("JOURNEY_LOG_FILTER", None);
            let _rust_log = EnvVarGuard::set("RUST_LOG", None);
            let config = TelemetryConfig::default();
            assert_eq!(config.format, LogFormat::Json);
            assert_eq!(config.filter, DEFAULT_FILTER);
        }
        {
            let _format = EnvVarGuard::set("JOURNEY_LOG_FORMAT", Some("pretty"));
            let _filter = EnvVarGuard::set("JOURNEY_LOG_FILTER", None);
            let _rust_log = EnvVarGuard::set("RUST_LOG", Some("debug"));
            let config = TelemetryConfig::default();
            assert_eq!(config.format, LogFormat::Pretty);
            assert_eq!(config.filter, "debug");
        }
        {
            let _filter = EnvVarGuard::set("JOURNEY_LOG_FILTER", Some("journey_engine=trace"));
            let _rust_log = EnvVarGuard::set("RUST_LOG", Some("debug"));
            assert_eq!(TelemetryConfig::default().filter, "journey_engine=trace");
        }
    }

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("JSON").unwrap(), LogFormat::Json);
        assert_eq!(LogFormat::parse("text").unwrap(), LogFormat::Pretty);
        assert!(LogFormat::parse("xml").is_err());
    }

    #[test]
    fn test_invalid_filter_is_config_error() {
        let config = TelemetryConfig::default().with_filter("journey_engine=notalevel");
        assert!(matches!(
            config.env_filter(),
            Err(JourneyError::Config(ConfigError::InvalidValue { .. }))
        ));
        assert!(init_tracing(&config).is_err());
    }

    #[test]
    fn test_second_init_fails() {
        let config = TelemetryConfig::default()
            .with_format(LogFormat::Pretty)
            .with_filter("warn");
        // Another test may already have installed the global subscriber.
        let _ = init_tracing(&config);
        assert!(matches!(
            init_tracing(&config),
            Err(JourneyError::Config(ConfigError::SubscriberInit { .. }))
        ));
    }
}
