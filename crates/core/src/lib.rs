//! # Music Platform Core
//!
//! Shared building blocks for Music Platform services.
//!
//! ## Modules
//!
//! - `error`: Platform error type
//! - `config`: Environment configuration loading and validation
//! - `database`: Shared PostgreSQL connection pool
//! - `telemetry`: Structured logging setup
//! - `health`: Dependency health checks

pub mod config;
pub mod database;
pub mod error;
pub mod health;
pub mod telemetry;

pub use config::{load_dotenv, ConfigLoader, DatabaseConfig, RedisConfig, ServiceConfig};
pub use database::{DatabasePool, PoolStats};
pub use error::MusicPlatformError;
pub use health::{AggregatedHealth, ComponentHealth, HealthCheck, HealthChecker, HealthStatus};
pub use telemetry::{init_tracing, store_span, LogFormat, TelemetryError, TracingConfig};

/// Result type alias for platform operations
pub type Result<T> = std::result::Result<T, MusicPlatformError>;
