//! `EmotionClassifier` trait and the reqwest-based `HttpClassifier`.
//!
//! One segment per call, multipart upload, bounded timeout, no retries and
//! no queuing — each call is independent and stateless. Retry policy, if
//! ever wanted, belongs to the controller.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

use crate::audio::AudioSegment;
use crate::config::ApiConfig;

use super::prediction::{PredictResponse, Prediction, PredictionError};

/// Multipart field name the service expects.
pub const UPLOAD_FIELD: &str = "file";

/// Filename attached to the uploaded blob, fixed by the service contract.
pub const UPLOAD_FILENAME: &str = "recording.webm";

// ---------------------------------------------------------------------------
// ApiError
// ---------------------------------------------------------------------------

/// Errors that can occur during a classification call.
///
/// All variants are recoverable from the session's point of view: the
/// controller surfaces them as a transient notice and capture continues.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request did not complete within the configured timeout.
    #[error("classification request timed out")]
    Timeout,

    /// Connection or transport failure before a response arrived.
    #[error("failed to reach classification service: {0}")]
    Transport(String),

    /// The service answered with a non-2xx status. Carries the `error`
    /// message from the response body when one was present.
    #[error("classification service rejected the request: {0}")]
    Rejected(String),

    /// The response body was not valid JSON of the expected shape.
    #[error("failed to parse service response: {0}")]
    Parse(String),

    /// The response parsed but violated the prediction invariants.
    #[error("invalid prediction in service response: {0}")]
    InvalidPrediction(#[from] PredictionError),
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ApiError::Timeout
        } else {
            ApiError::Transport(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// EmotionClassifier trait
// ---------------------------------------------------------------------------

/// Async trait for classifying one audio segment.
///
/// Implementors must be `Send + Sync` so they can be shared across tasks
/// (wrapped in `Arc<dyn EmotionClassifier>`). The segment is consumed —
/// ownership transfers on submission and the bytes are discarded after the
/// response either way.
#[async_trait]
pub trait EmotionClassifier: Send + Sync {
    async fn classify(&self, segment: AudioSegment) -> Result<Prediction, ApiError>;
}

// ---------------------------------------------------------------------------
// ServiceHealth
// ---------------------------------------------------------------------------

/// Response of the `GET /health` probe.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceHealth {
    pub status: String,
    pub model_loaded: bool,
    pub timestamp: String,
}

/// Error payload the service attaches to non-2xx responses.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

// ---------------------------------------------------------------------------
// HttpClassifier
// ---------------------------------------------------------------------------

/// Calls the remote classification service over HTTP.
///
/// All connection details (`base_url`, timeouts) come from [`ApiConfig`];
/// nothing is hardcoded.
pub struct HttpClassifier {
    client: reqwest::Client,
    base_url: String,
    health_timeout: Duration,
}

impl HttpClassifier {
    /// Build an `HttpClassifier` from application config.
    ///
    /// The HTTP client is pre-configured with the per-request timeout from
    /// `config.request_timeout_ms`. A default (no-timeout) client is used as
    /// a last-resort fallback if the builder fails (should never happen in
    /// practice).
    pub fn from_config(config: &ApiConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: config.base_url.clone(),
            health_timeout: config.health_timeout(),
        }
    }

    /// Probe `GET /health` with its own (shorter) timeout.
    ///
    /// Used by startup/operational tooling only — the capture pipeline never
    /// depends on it.
    pub async fn health(&self) -> Result<ServiceHealth, ApiError> {
        let url = format!("{}/health", self.base_url);

        let response = self
            .client
            .get(&url)
            .timeout(self.health_timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Rejected(format!(
                "health probe returned HTTP {status}"
            )));
        }

        response
            .json::<ServiceHealth>()
            .await
            .map_err(|e| ApiError::Parse(e.to_string()))
    }
}

#[async_trait]
impl EmotionClassifier for HttpClassifier {
    /// Submit one segment to `POST /predict` and validate the result.
    async fn classify(&self, segment: AudioSegment) -> Result<Prediction, ApiError> {
        let url = format!("{}/predict", self.base_url);

        log::debug!(
            "classify: uploading {} bytes ({})",
            segment.bytes.len(),
            segment.mime_type
        );

        let part = reqwest::multipart::Part::bytes(segment.bytes)
            .file_name(UPLOAD_FILENAME)
            .mime_str(segment.mime_type)
            .map_err(|e| ApiError::Parse(e.to_string()))?;
        let form = reqwest::multipart::Form::new().part(UPLOAD_FIELD, part);

        let response = self.client.post(&url).multipart(form).send().await?;

        let status = response.status();
        if !status.is_success() {
            // The body may carry `{ "error": "..." }`; fall back to a
            // generic connectivity message when it does not.
            let message = response
                .json::<ErrorBody>()
                .await
                .map(|body| body.error)
                .unwrap_or_else(|_| format!("service returned HTTP {status}"));
            return Err(ApiError::Rejected(message));
        }

        let body: PredictResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Parse(e.to_string()))?;

        Ok(Prediction::try_from(body)?)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
