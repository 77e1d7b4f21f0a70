//! Error handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

/// Failure talking to the verdict cache.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct CacheError(pub String);

/// Failure talking to the verdict store.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct StoreError(pub String);

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError(err.to_string())
    }
}

/// Escalation to the classification oracle failed.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("classification request timed out")]
    Timeout,
    #[error("classification service unreachable: {0}")]
    Transport(String),
    #[error("malformed classification response: {0}")]
    Malformed(String),
}

/// Fanout publish failure. The pipeline inspects and discards this; it is
/// the only error class that never propagates to callers.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct FanoutError(pub String);

/// Verdict resolution failed. A storage outage must surface as an error,
/// never as an "unknown hash" verdict.
#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("verdict cache unavailable: {0}")]
    CacheUnavailable(#[from] CacheError),
    #[error("verdict store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),
}

/// Scan submission failed.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error(transparent)]
    Oracle(#[from] OracleError),
    #[error("verdict store unavailable: {0}")]
    Store(#[from] StoreError),
}

/// HTTP-facing error.
#[derive(Debug)]
pub enum AppError {
    ValidationError(String),
    CacheUnavailable(String),
    StoreUnavailable(String),
    OracleTimeout,
    OracleError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg.as_str()),
            AppError::CacheUnavailable(msg) => {
                tracing::error!("Cache error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Verdict cache error")
            }
            AppError::StoreUnavailable(msg) => {
                tracing::error!("Store error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Verdict store error")
            }
            AppError::OracleTimeout => {
                (StatusCode::GATEWAY_TIMEOUT, "Classification service timed out")
            }
            AppError::OracleError(msg) => {
                tracing::error!("Oracle error: {}", msg);
                (StatusCode::BAD_GATEWAY, "Classification service error")
            }
        };

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

impl From<ResolutionError> for AppError {
    fn from(err: ResolutionError) -> Self {
        match err {
            ResolutionError::CacheUnavailable(e) => AppError::CacheUnavailable(e.to_string()),
            ResolutionError::StoreUnavailable(e) => AppError::StoreUnavailable(e.to_string()),
        }
    }
}

impl From<ScanError> for AppError {
    fn from(err: ScanError) -> Self {
        match err {
            ScanError::Oracle(OracleError::Timeout) => AppError::OracleTimeout,
            ScanError::Oracle(e) => AppError::OracleError(e.to_string()),
            ScanError::Store(e) => AppError::StoreUnavailable(e.to_string()),
        }
    }
}
