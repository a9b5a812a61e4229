//! Dependency probes for the `/health` endpoint
//!
//! PostgreSQL holds the catalog and listening history, so losing it makes the service
//! unhealthy. Redis only carries wave dislikes and its loss degrades the service.
//! Probes run concurrently, each bounded by a 2 second timeout.
//!
//! ```rust,no_run
//! use music_platform_core::health::{AggregatedHealth, HealthChecker};
//!
//! async fn health_endpoint(checker: &HealthChecker) -> AggregatedHealth {
//!     checker.check_all().await
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, warn};

const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    /// An optional dependency is down; traffic is still served
    Degraded,
    /// A critical dependency is down
    Unhealthy,
}

impl HealthStatus {
    pub fn is_ready(&self) -> bool {
        *self != HealthStatus::Unhealthy
    }

    /// Worst status across components, where only critical failures are fatal
    pub fn aggregate(components: &[ComponentHealth]) -> Self {
        components
            .iter()
            .map(|c| match (c.status, c.critical) {
                (HealthStatus::Healthy, _) => HealthStatus::Healthy,
                (_, true) => HealthStatus::Unhealthy,
                (_, false) => HealthStatus::Degraded,
            })
            .max_by_key(|status| match status {
                HealthStatus::Healthy => 0,
                HealthStatus::Degraded => 1,
                HealthStatus::Unhealthy => 2,
            })
            .unwrap_or(HealthStatus::Healthy)
    }
}

/// Outcome of one probe
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentHealth {
    pub name: String,
    pub status: HealthStatus,
    pub critical: bool,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ComponentHealth {
    pub fn from_outcome(
        name: impl Into<String>,
        critical: bool,
        latency_ms: u64,
        outcome: std::result::Result<(), String>,
    ) -> Self {
        let (status, error) = match outcome {
            Ok(()) => (HealthStatus::Healthy, None),
            Err(e) => (HealthStatus::Unhealthy, Some(e)),
        };
        Self {
            name: name.into(),
            status,
            critical,
            latency_ms,
            error,
        }
    }
}

/// Body of the `/health` response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedHealth {
    pub service: String,
    pub status: HealthStatus,
    pub version: String,
    pub checked_at: DateTime<Utc>,
    pub latency_ms: u64,
    pub components: Vec<ComponentHealth>,
}

impl AggregatedHealth {
    pub fn from_components(
        service: impl Into<String>,
        components: Vec<ComponentHealth>,
        latency_ms: u64,
    ) -> Self {
        Self {
            service: service.into(),
            status: HealthStatus::aggregate(&components),
            version: env!("CARGO_PKG_VERSION").to_string(),
            checked_at: Utc::now(),
            latency_ms,
            components,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.status.is_ready()
    }
}

/// A probe for one dependency
#[async_trait::async_trait]
pub trait HealthCheck: Send + Sync {
    async fn check(&self) -> ComponentHealth;

    fn name(&self) -> &str;
}

async fn timed_probe<F, E>(name: &str, critical: bool, probe: F) -> ComponentHealth
where
    F: Future<Output = std::result::Result<(), E>>,
    E: std::fmt::Display,
{
    let start = Instant::now();
    let outcome = match timeout(PROBE_TIMEOUT, probe).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err(format!("no reply within {}s", PROBE_TIMEOUT.as_secs())),
    };
    let latency_ms = start.elapsed().as_millis() as u64;

    match &outcome {
        Ok(()) => debug!(component = name, latency_ms, "Probe passed"),
        Err(e) => warn!(component = name, critical, error = %e, "Probe failed"),
    }
    ComponentHealth::from_outcome(name, critical, latency_ms, outcome)
}

/// Catalog and history database
pub struct PostgresHealthCheck {
    pool: PgPool,
}

impl PostgresHealthCheck {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl HealthCheck for PostgresHealthCheck {
    async fn check(&self) -> ComponentHealth {
        let probe = sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(&self.pool);
        timed_probe(self.name(), true, async { probe.await.map(|_| ()) }).await
    }

    fn name(&self) -> &str {
        "postgres"
    }
}

/// Preference cache
pub struct RedisHealthCheck {
    client: redis::Client,
}

impl RedisHealthCheck {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl HealthCheck for RedisHealthCheck {
    async fn check(&self) -> ComponentHealth {
        timed_probe(self.name(), false, async {
            let mut conn = self.client.get_multiplexed_async_connection().await?;
            redis::cmd("PING").query_async::<_, String>(&mut conn).await.map(|_| ())
        })
        .await
    }

    fn name(&self) -> &str {
        "redis"
    }
}

/// Runs every registered probe
pub struct HealthChecker {
    service: String,
    checks: Vec<Arc<dyn HealthCheck>>,
}

impl HealthChecker {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            checks: Vec::new(),
        }
    }

    pub fn add_check(mut self, check: impl HealthCheck + 'static) -> Self {
        self.checks.push(Arc::new(check));
        self
    }

    pub fn with_postgres(self, pool: PgPool) -> Self {
        self.add_check(PostgresHealthCheck::new(pool))
    }

    pub fn with_redis(self, client: redis::Client) -> Self {
        self.add_check(RedisHealthCheck::new(client))
    }

    /// Probe all dependencies concurrently; components keep registration order
    pub async fn check_all(&self) -> AggregatedHealth {
        let start = Instant::now();

        let mut probes = JoinSet::new();
        for (index, check) in self.checks.iter().enumerate() {
            let check = Arc::clone(check);
            probes.spawn(async move { (index, check.check().await) });
        }

        let mut results: Vec<Option<ComponentHealth>> = vec![None; self.checks.len()];
        while let Some(joined) = probes.join_next().await {
            match joined {
                Ok((index, component)) => results[index] = Some(component),
                Err(e) => warn!(error = %e, "Health probe task aborted"),
            }
        }

        // A probe task that panicked is reported as a failed critical component.
        let components = results
            .into_iter()
            .enumerate()
            .map(|(index, component)| {
                component.unwrap_or_else(|| {
                    ComponentHealth::from_outcome(
                        self.checks[index].name(),
                        true,
                        0,
                        Err("probe aborted".to_string()),
                    )
                })
            })
            .collect();

        AggregatedHealth::from_components(
            self.service.clone(),
            components,
            start.elapsed().as_millis() as u64,
        )
    }
}
