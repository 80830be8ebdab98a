use anyhow::{Context, Result};
use fleet_api::cars::CarRepository;
use fleet_api::config::AppConfig;
use fleet_api::routes::{build_router, AppState};
use request_tracker::{
    CachedRequestStore, InMemoryRequestStore, PostgresRequestStore, RequestStore, RequestTracker,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,fleet_api=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting fleet-api");

    dotenvy::dotenv().ok();
    let config = AppConfig::from_env();
    config.log_config();

    let store: Arc<dyn RequestStore> = match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(url)
                .await
                .context("Failed to connect to PostgreSQL")?;

            tracing::info!("Running database migrations...");
            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .context("Failed to run migrations")?;

            Arc::new(CachedRequestStore::with_config(
                PostgresRequestStore::with_retention(pool, config.retention()),
                config.cache_config(),
            ))
        }
        None => {
            tracing::warn!(
                "DATABASE_URL not set, tracked requests are held in memory and lost on restart"
            );
            Arc::new(CachedRequestStore::with_config(
                InMemoryRequestStore::with_retention(config.retention()),
                config.cache_config(),
            ))
        }
    };

    let tracker = Arc::new(RequestTracker::new(store));

    // Retention purge loop, the backstop for orphaned pending records
    let purge_tracker = tracker.clone();
    let purge_interval = config.purge_interval();
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(purge_interval).await;
            match purge_tracker.store().purge_expired().await {
                Ok(0) => {}
                Ok(deleted) => tracing::info!(deleted, "purged expired tracked requests"),
                Err(e) => tracing::error!(error = %e, "tracked request purge failed"),
            }
        }
    });

    let state = AppState {
        cars: Arc::new(CarRepository::new()),
    };
    let app = build_router(state, tracker);

    let addr = format!("{}:{}", config.http_host, config.http_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("fleet-api listening on {}", addr);

    axum::serve(listener, app).await.context("HTTP server error")
}
