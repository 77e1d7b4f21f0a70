//! Scan submission handler

use axum::extract::{Multipart, State};
use axum::Json;

use crate::error::AppError;
use crate::models::VerdictRecord;
use crate::{AppResult, AppState};

/// Accept raw file content and escalate it to the classification oracle.
///
/// Expects a multipart body with a `file` field. The verdict is persisted
/// for future event resolutions before it is returned.
pub async fn submit(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<Json<VerdictRecord>> {
    let mut content: Option<Vec<u8>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::ValidationError(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() == Some("file") {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::ValidationError(format!("Unreadable file field: {}", e)))?;
            content = Some(bytes.to_vec());
        }
    }

    let content = content
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::ValidationError("Missing file field".to_string()))?;

    tracing::debug!("Scan submission of {} bytes", content.len());

    let record = state.pipeline.submit_scan(&content).await?;

    Ok(Json(record))
}
