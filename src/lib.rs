//! HashGuard Cloud Backend
//!
//! Verdict resolution server for endpoint sensor events.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      HASHGUARD CLOUD                         │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌──────────┐   ┌──────────────────┐   ┌──────────────────┐  │
//! │  │  API     │   │ Verdict Pipeline │   │  Event Fanout    │  │
//! │  │  (Axum)  │──▶│ cache ─▶ store   │──▶│  (subscribers)   │  │
//! │  └──────────┘   │       ─▶ oracle  │   └──────────────────┘  │
//! │                 └────────┬─────────┘                         │
//! │                          ▼                                   │
//! │                   ┌─────────────┐                            │
//! │                   │ PostgreSQL  │                            │
//! │                   └─────────────┘                            │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod cache;
pub mod config;
pub mod db;
pub mod dispatch;
pub mod error;
pub mod fanout;
pub mod handlers;
pub mod models;
pub mod oracle;
pub mod pipeline;
pub mod store;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub use error::{AppError, AppResult};
use pipeline::VerdictPipeline;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pool: sqlx::PgPool,
    pub pipeline: Arc<VerdictPipeline>,
    pub config: config::Config,
}

/// Create the main router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::check))
        .route("/api/v1/events", post(handlers::events::resolve))
        .route("/api/v1/scan", post(handlers::scan::submit))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
