//! Wave Recommendation Service
//!
//! Port: 8082 (MUSIC_PLATFORM_SERVICE_PORT / PORT)

use actix_web::{web, App, HttpServer};
use anyhow::Context;
use music_platform_core::{
    init_tracing, load_dotenv, ConfigLoader, DatabaseConfig, DatabasePool, HealthChecker,
    RedisConfig, ServiceConfig, TracingConfig,
};
use music_platform_wave::handlers::{self, AppState};
use music_platform_wave::store::{PgStore, PreferenceStore, RedisPreferenceStore};
use music_platform_wave::{RecommendationConfig, RecommendationEngine, Stores};
use std::sync::Arc;
use tracing::{info, warn};

const SERVICE_NAME: &str = "wave-service";

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();
    init_tracing(TracingConfig::from_env().with_service_name(SERVICE_NAME))?;

    let service = ServiceConfig::from_env()?;
    let database = DatabaseConfig::from_env()?;
    let redis = RedisConfig::from_env_optional()?;
    service.validate()?;
    database.validate()?;
    if let Some(redis) = &redis {
        redis.validate()?;
    }
    let recommendation = RecommendationConfig::load().context("invalid recommendation config")?;

    let pool = DatabasePool::connect(&database)
        .await
        .context("failed to connect to PostgreSQL")?;
    let pg = Arc::new(PgStore::new(pool.pool().clone()));

    let mut health = HealthChecker::new(SERVICE_NAME).with_postgres(pool.pool().clone());

    let preferences: Arc<dyn PreferenceStore> = match &redis {
        Some(redis_config) => {
            let client = redis::Client::open(redis_config.url.as_str())
                .context("invalid Redis URL")?;
            health = health.with_redis(client);
            match RedisPreferenceStore::connect(redis_config).await {
                Ok(store) => {
                    info!(prefix = %redis_config.key_prefix, "Dislikes stored in Redis");
                    Arc::new(store)
                }
                Err(e) => {
                    warn!(error = %e, "Redis unavailable, storing dislikes in PostgreSQL");
                    pg.clone()
                }
            }
        }
        None => pg.clone(),
    };

    let stores = Stores::new(pg.clone(), pg, preferences);
    let engine = Arc::new(RecommendationEngine::new(stores).with_config(recommendation));
    let state = web::Data::new(AppState {
        engine,
        health: Arc::new(health),
    });

    info!(
        host = %service.host,
        port = service.port,
        workers = service.workers,
        "Starting wave recommendation service"
    );

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .configure(handlers::configure)
    })
    .workers(service.workers)
    .bind((service.host.as_str(), service.port))?
    .run()
    .await?;

    Ok(())
}
