//! HashGuard Cloud Backend Server
//!
//! Resolves risk verdicts for file and process hashes reported by endpoint
//! sensors: tiered cache in front of a durable store, unknown content
//! escalated to the classification oracle, every event mirrored to the
//! fanout subscribers.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hashguard_cloud::cache::MemoryCache;
use hashguard_cloud::fanout::WebhookFanout;
use hashguard_cloud::oracle::HttpOracle;
use hashguard_cloud::pipeline::VerdictPipeline;
use hashguard_cloud::store::PgVerdictStore;
use hashguard_cloud::{config, create_router, db, AppState};

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "hashguard_cloud=debug,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = config::Config::from_env();

    tracing::info!("HashGuard Cloud Server starting...");
    tracing::info!("Database: {}", config.database_url.split('@').last().unwrap_or("***"));
    tracing::info!("Oracle: {}", config.oracle_url);
    tracing::info!("Fanout subscribers: {}", config.fanout_subscribers.len());

    // Initialize database pool
    let pool = db::create_pool(&config.database_url).await
        .expect("Failed to create database pool");

    // Apply schema
    db::run_migrations(&pool).await
        .expect("Failed to apply database schema");

    // Wire the resolution pipeline; collaborators are constructed once and
    // injected here, never re-initialized on the request path.
    let pipeline = Arc::new(VerdictPipeline::new(
        Arc::new(MemoryCache::new(config.cache_capacity)),
        Arc::new(PgVerdictStore::new(pool.clone())),
        Arc::new(HttpOracle::new(
            config.oracle_url.clone(),
            Duration::from_secs(config.oracle_timeout_secs),
        )),
        Arc::new(WebhookFanout::new(config.fanout_subscribers.clone())),
    ));

    // Build application state
    let state = AppState {
        pool,
        pipeline,
        config: config.clone(),
    };

    // Build router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("🚀 Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
