//! Shared configuration loader for Music Platform services
//!
//! Infrastructure settings (database, cache, HTTP service) are read from environment
//! variables with the `MUSIC_PLATFORM_` prefix. A few unprefixed fallbacks
//! (`DATABASE_URL`, `REDIS_URL`, `PORT`, `RUST_LOG`) are honoured so the services run
//! unchanged on common hosting platforms.
//!
//! Override order: defaults < .env < process environment.
//!
//! # Example
//!
//! ```no_run
//! use music_platform_core::config::{load_dotenv, ConfigLoader, DatabaseConfig, ServiceConfig};
//!
//! # fn example() -> Result<(), music_platform_core::MusicPlatformError> {
//! load_dotenv();
//!
//! let db_config = DatabaseConfig::from_env()?;
//! let service_config = ServiceConfig::from_env()?;
//!
//! db_config.validate()?;
//! service_config.validate()?;
//! # Ok(())
//! # }
//! ```

use crate::error::MusicPlatformError;
use std::time::Duration;
use url::Url;

/// Configuration loader trait
///
/// Implementors read their values from the process environment and apply defaults for
/// optional fields.
pub trait ConfigLoader: Sized {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` when a required variable is missing or a value
    /// cannot be parsed.
    fn from_env() -> Result<Self, MusicPlatformError> {
        Self::from_source(&|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    fn from_source(source: &dyn Fn(&str) -> Option<String>) -> Result<Self, MusicPlatformError>;

    /// Validate configuration values
    fn validate(&self) -> Result<(), MusicPlatformError>;
}

/// PostgreSQL connection settings
///
/// # Environment Variables
///
/// - `MUSIC_PLATFORM_DATABASE_URL` or `DATABASE_URL` (required)
/// - `MUSIC_PLATFORM_DATABASE_MAX_CONNECTIONS` (default: 20)
/// - `MUSIC_PLATFORM_DATABASE_MIN_CONNECTIONS` (default: 2)
/// - `MUSIC_PLATFORM_DATABASE_CONNECT_TIMEOUT` seconds (default: 30)
/// - `MUSIC_PLATFORM_DATABASE_IDLE_TIMEOUT` seconds (default: 600)
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: Duration,
    pub idle_timeout: Duration,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost/music_platform".to_string(),
            max_connections: 20,
            min_connections: 2,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
        }
    }
}

impl ConfigLoader for DatabaseConfig {
    fn from_source(source: &dyn Fn(&str) -> Option<String>) -> Result<Self, MusicPlatformError> {
        let defaults = Self::default();

        let url = source("MUSIC_PLATFORM_DATABASE_URL")
            .or_else(|| source("DATABASE_URL"))
            .ok_or_else(|| {
                MusicPlatformError::config(
                    "DATABASE_URL or MUSIC_PLATFORM_DATABASE_URL must be set",
                    "MUSIC_PLATFORM_DATABASE_URL",
                )
            })?;

        Ok(Self {
            url,
            max_connections: parse_var(
                source,
                "MUSIC_PLATFORM_DATABASE_MAX_CONNECTIONS",
                defaults.max_connections,
            )?,
            min_connections: parse_var(
                source,
                "MUSIC_PLATFORM_DATABASE_MIN_CONNECTIONS",
                defaults.min_connections,
            )?,
            connect_timeout: Duration::from_secs(parse_var(
                source,
                "MUSIC_PLATFORM_DATABASE_CONNECT_TIMEOUT",
                defaults.connect_timeout.as_secs(),
            )?),
            idle_timeout: Duration::from_secs(parse_var(
                source,
                "MUSIC_PLATFORM_DATABASE_IDLE_TIMEOUT",
                defaults.idle_timeout.as_secs(),
            )?),
        })
    }

    fn validate(&self) -> Result<(), MusicPlatformError> {
        Url::parse(&self.url).map_err(|e| {
            MusicPlatformError::config(
                format!("Invalid DATABASE_URL: {}", e),
                "MUSIC_PLATFORM_DATABASE_URL",
            )
        })?;

        if self.max_connections == 0 {
            return Err(MusicPlatformError::config(
                "max_connections must be greater than 0",
                "MUSIC_PLATFORM_DATABASE_MAX_CONNECTIONS",
            ));
        }

        if self.min_connections > self.max_connections {
            return Err(MusicPlatformError::config(
                format!(
                    "min_connections ({}) cannot exceed max_connections ({})",
                    self.min_connections, self.max_connections
                ),
                "MUSIC_PLATFORM_DATABASE_MIN_CONNECTIONS",
            ));
        }

        if self.connect_timeout.is_zero() {
            return Err(MusicPlatformError::config(
                "connect_timeout must be greater than 0 seconds",
                "MUSIC_PLATFORM_DATABASE_CONNECT_TIMEOUT",
            ));
        }

        Ok(())
    }
}

/// Redis settings
///
/// Redis backs the dislike preference store. It is optional: when neither
/// `MUSIC_PLATFORM_REDIS_URL` nor `REDIS_URL` is set the service keeps preferences in
/// PostgreSQL.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: String,
    /// Key prefix applied to every key the service writes
    pub key_prefix: String,
    pub connection_timeout: Duration,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379/0".to_string(),
            key_prefix: "music".to_string(),
            connection_timeout: Duration::from_secs(5),
        }
    }
}

impl RedisConfig {
    /// Load Redis settings only when a URL is configured
    pub fn from_env_optional() -> Result<Option<Self>, MusicPlatformError> {
        let configured = std::env::var("MUSIC_PLATFORM_REDIS_URL").is_ok()
            || std::env::var("REDIS_URL").is_ok();

        if configured {
            Self::from_env().map(Some)
        } else {
            Ok(None)
        }
    }
}

impl ConfigLoader for RedisConfig {
    fn from_source(source: &dyn Fn(&str) -> Option<String>) -> Result<Self, MusicPlatformError> {
        let defaults = Self::default();

        let url = source("MUSIC_PLATFORM_REDIS_URL")
            .or_else(|| source("REDIS_URL"))
            .ok_or_else(|| {
                MusicPlatformError::config(
                    "REDIS_URL or MUSIC_PLATFORM_REDIS_URL must be set",
                    "MUSIC_PLATFORM_REDIS_URL",
                )
            })?;

        let key_prefix =
            source("MUSIC_PLATFORM_REDIS_KEY_PREFIX").unwrap_or(defaults.key_prefix);

        let timeout_secs = parse_var(
            source,
            "MUSIC_PLATFORM_REDIS_CONNECTION_TIMEOUT",
            defaults.connection_timeout.as_secs(),
        )?;

        Ok(Self {
            url,
            key_prefix,
            connection_timeout: Duration::from_secs(timeout_secs),
        })
    }

    fn validate(&self) -> Result<(), MusicPlatformError> {
        let parsed = Url::parse(&self.url).map_err(|e| {
            MusicPlatformError::config(
                format!("Invalid REDIS_URL: {}", e),
                "MUSIC_PLATFORM_REDIS_URL",
            )
        })?;

        if !matches!(parsed.scheme(), "redis" | "rediss") {
            return Err(MusicPlatformError::config(
                format!("Unsupported Redis scheme '{}'", parsed.scheme()),
                "MUSIC_PLATFORM_REDIS_URL",
            ));
        }

        if self.key_prefix.is_empty() {
            return Err(MusicPlatformError::config(
                "key_prefix must not be empty",
                "MUSIC_PLATFORM_REDIS_KEY_PREFIX",
            ));
        }

        Ok(())
    }
}

/// HTTP service settings
///
/// # Environment Variables
///
/// - `MUSIC_PLATFORM_SERVICE_HOST` or `HOST` (default: "0.0.0.0")
/// - `MUSIC_PLATFORM_SERVICE_PORT` or `PORT` (default: 8082)
/// - `MUSIC_PLATFORM_SERVICE_WORKERS` (default: CPU count)
/// - `MUSIC_PLATFORM_SERVICE_LOG_LEVEL` or `RUST_LOG` (default: "info")
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub workers: usize,
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8082,
            workers: num_cpus::get(),
            log_level: "info".to_string(),
        }
    }
}

impl ConfigLoader for ServiceConfig {
    fn from_source(source: &dyn Fn(&str) -> Option<String>) -> Result<Self, MusicPlatformError> {
        let defaults = Self::default();

        let host = source("MUSIC_PLATFORM_SERVICE_HOST")
            .or_else(|| source("HOST"))
            .unwrap_or(defaults.host);

        let port = match source("MUSIC_PLATFORM_SERVICE_PORT") {
            Some(_) => parse_var(source, "MUSIC_PLATFORM_SERVICE_PORT", defaults.port)?,
            None => parse_var(source, "PORT", defaults.port)?,
        };

        let workers = parse_var(source, "MUSIC_PLATFORM_SERVICE_WORKERS", defaults.workers)?;

        let log_level = source("MUSIC_PLATFORM_SERVICE_LOG_LEVEL")
            .or_else(|| source("RUST_LOG"))
            .unwrap_or(defaults.log_level);

        Ok(Self {
            host,
            port,
            workers,
            log_level,
        })
    }

    fn validate(&self) -> Result<(), MusicPlatformError> {
        if self.port == 0 {
            return Err(MusicPlatformError::config(
                "port must be greater than 0",
                "MUSIC_PLATFORM_SERVICE_PORT",
            ));
        }

        if self.workers == 0 {
            return Err(MusicPlatformError::config(
                "workers must be greater than 0",
                "MUSIC_PLATFORM_SERVICE_WORKERS",
            ));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(MusicPlatformError::config(
                format!(
                    "Invalid log_level '{}'. Must be one of: {}",
                    self.log_level,
                    valid_log_levels.join(", ")
                ),
                "MUSIC_PLATFORM_SERVICE_LOG_LEVEL",
            ));
        }

        Ok(())
    }
}

/// Parse a variable from `source`, falling back to `default` when it is absent
fn parse_var<T>(
    source: &dyn Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, MusicPlatformError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match source(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| MusicPlatformError::config(format!("Failed to parse {}: {}", key, e), key)),
        None => Ok(default),
    }
}

/// Load a `.env` file if one is present
///
/// A missing file is not an error.
pub fn load_dotenv() {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn source_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_database_config_default() {
        let config = DatabaseConfig::default();
        assert_eq!(config.max_connections, 20);
        assert_eq!(config.min_connections, 2);
        assert_eq!(config.idle_timeout, Duration::from_secs(600));
    }

    #[test]
    fn test_database_config_from_source() {
        let source = source_from(&[
            ("MUSIC_PLATFORM_DATABASE_URL", "postgresql://localhost/test"),
            ("MUSIC_PLATFORM_DATABASE_MAX_CONNECTIONS", "50"),
            ("MUSIC_PLATFORM_DATABASE_MIN_CONNECTIONS", "5"),
        ]);

        let config = DatabaseConfig::from_source(&source).unwrap();
        assert_eq!(config.url, "postgresql://localhost/test");
        assert_eq!(config.max_connections, 50);
        assert_eq!(config.min_connections, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_database_url_fallback() {
        let source = source_from(&[("DATABASE_URL", "postgresql://fallback/test")]);
        let config = DatabaseConfig::from_source(&source).unwrap();
        assert_eq!(config.url, "postgresql://fallback/test");
    }

    #[test]
    fn test_database_url_missing() {
        let source = source_from(&[]);
        let err = DatabaseConfig::from_source(&source).unwrap_err();
        assert_eq!(err.config_key(), Some("MUSIC_PLATFORM_DATABASE_URL"));
    }

    #[test]
    fn test_database_config_validation_min_exceeds_max() {
        let mut config = DatabaseConfig::default();
        config.min_connections = 30;
        config.max_connections = 20;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_database_config_validation_invalid_url() {
        let mut config = DatabaseConfig::default();
        config.url = "not-a-valid-url".to_string();
        assert!(matches!(
            config.validate().unwrap_err(),
            MusicPlatformError::ConfigurationError { .. }
        ));
    }

    #[test]
    fn test_redis_config_rejects_http_scheme() {
        let mut config = RedisConfig::default();
        config.url = "http://localhost:6379".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_redis_config_from_source() {
        let source = source_from(&[
            ("REDIS_URL", "redis://cache:6379/1"),
            ("MUSIC_PLATFORM_REDIS_KEY_PREFIX", "wave"),
        ]);
        let config = RedisConfig::from_source(&source).unwrap();
        assert_eq!(config.url, "redis://cache:6379/1");
        assert_eq!(config.key_prefix, "wave");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_service_config_port_fallback() {
        let source = source_from(&[("PORT", "9000")]);
        let config = ServiceConfig::from_source(&source).unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.host, "0.0.0.0");
    }

    #[test]
    fn test_service_config_prefixed_port_wins() {
        let source = source_from(&[("PORT", "9000"), ("MUSIC_PLATFORM_SERVICE_PORT", "3000")]);
        let config = ServiceConfig::from_source(&source).unwrap();
        assert_eq!(config.port, 3000);
    }

    #[test]
    fn test_service_config_validation_invalid_log_level() {
        let mut config = ServiceConfig::default();
        config.log_level = "loud".to_string();

        match config.validate().unwrap_err() {
            MusicPlatformError::ConfigurationError { message, .. } => {
                assert!(message.contains("Invalid log_level"));
            }
            _ => panic!("Expected ConfigurationError"),
        }
    }

    #[test]
    fn test_parse_var_invalid_value() {
        let source = source_from(&[("MUSIC_PLATFORM_SERVICE_WORKERS", "many")]);
        assert!(ServiceConfig::from_source(&source).is_err());
    }
}
