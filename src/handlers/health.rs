//! Health check handler

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    store: &'static str,
    timestamp: i64,
}

/// Liveness plus a verdict store round-trip.
pub async fn check(State(state): State<AppState>) -> Json<HealthResponse> {
    let store = match sqlx::query("SELECT 1").execute(&state.pool).await {
        Ok(_) => "reachable",
        Err(e) => {
            tracing::warn!("Health check store ping failed: {}", e);
            "unreachable"
        }
    };

    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        store,
        timestamp: chrono::Utc::now().timestamp(),
    })
}
