//! Classification oracle client
//!
//! The oracle receives raw content and returns a verdict keyed by a hash it
//! computes itself; a caller-supplied hash is never trusted or consulted.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::OracleError;
use crate::models::VerdictRecord;

/// External classification authority.
#[async_trait]
pub trait ClassificationOracle: Send + Sync {
    async fn classify(&self, content: &[u8]) -> Result<VerdictRecord, OracleError>;
}

#[derive(Debug, Deserialize)]
struct OracleResponse {
    hash: String,
    risk_level: i32,
}

/// HTTP oracle client. Posts content as a multipart form (`file` field) and
/// expects a `{hash, risk_level}` JSON body.
pub struct HttpOracle {
    client: reqwest::Client,
    url: String,
}

impl HttpOracle {
    pub fn new(url: String, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create oracle HTTP client");

        Self { client, url }
    }
}

#[async_trait]
impl ClassificationOracle for HttpOracle {
    async fn classify(&self, content: &[u8]) -> Result<VerdictRecord, OracleError> {
        let form = reqwest::multipart::Form::new()
            .part("file", reqwest::multipart::Part::bytes(content.to_vec()));

        let response = self
            .client
            .post(&self.url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    OracleError::Timeout
                } else {
                    OracleError::Transport(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(OracleError::Transport(format!(
                "oracle returned HTTP {}",
                response.status()
            )));
        }

        let body: OracleResponse = response
            .json()
            .await
            .map_err(|e| OracleError::Malformed(e.to_string()))?;

        validate_response(body)
    }
}

/// A verdict with an empty hash or a negative level must never enter the
/// store; reject it at this boundary.
fn validate_response(body: OracleResponse) -> Result<VerdictRecord, OracleError> {
    if body.hash.is_empty() {
        return Err(OracleError::Malformed("empty hash".to_string()));
    }
    if body.risk_level < 0 {
        return Err(OracleError::Malformed(format!(
            "negative risk_level {}",
            body.risk_level
        )));
    }

    Ok(VerdictRecord {
        hash: body.hash,
        risk_level: body.risk_level,
    })
}
