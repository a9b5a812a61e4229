//! Error types shared by Music Platform services

use thiserror::Error;

/// Platform-wide error type
#[derive(Debug, Error)]
pub enum MusicPlatformError {
    /// Invalid or missing configuration value
    #[error("Configuration error: {message}")]
    ConfigurationError {
        message: String,
        /// Environment variable or config key that caused the failure
        key: Option<String>,
    },

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Cache error: {0}")]
    CacheError(#[from] redis::RedisError),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl MusicPlatformError {
    /// Build a configuration error bound to a specific key
    pub fn config(message: impl Into<String>, key: impl Into<String>) -> Self {
        MusicPlatformError::ConfigurationError {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// Key that caused a configuration error, if any
    pub fn config_key(&self) -> Option<&str> {
        match self {
            MusicPlatformError::ConfigurationError { key, .. } => key.as_deref(),
            _ => None,
        }
    }
}
