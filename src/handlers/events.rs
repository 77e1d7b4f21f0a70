//! Event resolution handler

use axum::{extract::State, Json};

use crate::models::{Event, EventsResponse};
use crate::{AppResult, AppState};

/// Resolve verdicts for the two hashes referenced by an event.
pub async fn resolve(
    State(state): State<AppState>,
    Json(event): Json<Event>,
) -> AppResult<Json<EventsResponse>> {
    tracing::debug!(
        "Resolving event from device {} (file {}, process {})",
        event.device.id,
        event.file.hash,
        event.process.hash
    );

    let verdicts = state.pipeline.resolve_event(&event).await?;

    Ok(Json(verdicts.into()))
}
