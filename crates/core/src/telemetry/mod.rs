//! Structured logging for Music Platform services
//!
//! Wraps `tracing-subscriber` initialisation so every binary emits the same JSON log
//! shape in production and readable output during development.
//!
//! # Example
//!
//! ```rust,no_run
//! use music_platform_core::telemetry::{init_tracing, TracingConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     init_tracing(TracingConfig::from_env())?;
//!     Ok(())
//! }
//! ```

pub mod tracing;

pub use self::tracing::{init_tracing, store_span, LogFormat, TelemetryError, TracingConfig};
