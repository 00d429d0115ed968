//! Remote image classification client.

use super::format::{describe_unknown, ImageFormat};
use crate::upstream::{AsyncHttpClient, HttpError, RetryPolicy, Retryable};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Default bound on a single inference request.
pub const DEFAULT_INFERENCE_TIMEOUT_SECS: u64 = 30;
/// Reported when the endpoint does not name its model.
pub const UNKNOWN_MODEL_VERSION: &str = "unknown";

/// Errors from [`InferenceClient::classify`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InferenceError {
    /// No answer within the request timeout. Retried once.
    #[error("inference request to {url} timed out after {timeout_secs}s")]
    Timeout { url: String, timeout_secs: u64 },

    #[error("inference endpoint {url} returned HTTP {status}")]
    Status { status: u16, url: String },

    #[error("malformed inference response: {0}")]
    Malformed(String),

    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("inference request failed: {0}")]
    Request(String),
}

impl InferenceError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    fn from_http(e: HttpError, timeout_secs: u64) -> Self {
        match e {
            HttpError::Timeout { url } => Self::Timeout { url, timeout_secs },
            HttpError::Status { status, url } => Self::Status { status, url },
            other => Self::Request(other.to_string()),
        }
    }
}

impl Retryable for InferenceError {
    fn is_retryable(&self) -> bool {
        self.is_timeout()
    }
}

/// A prediction for one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub label: String,
    /// Always within `0.0..=1.0`
    pub confidence: f64,
    pub model_version: String,
    /// Set when the endpoint reported a confidence outside `0..=1`
    #[serde(default)]
    pub confidence_clamped: bool,
}

/// Accepted response shapes: a single prediction object, a ranked list of
/// predictions, or a `{ "predictions": [...] }` envelope.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireResponse {
    Single(WirePrediction),
    Envelope {
        predictions: Vec<WirePrediction>,
        #[serde(default, alias = "version")]
        model_version: Option<String>,
    },
    Ranked(Vec<WirePrediction>),
}

#[derive(Debug, Deserialize)]
struct WirePrediction {
    #[serde(alias = "class", alias = "prediction")]
    label: String,
    #[serde(alias = "score", alias = "probability")]
    confidence: f64,
    #[serde(default, alias = "version", alias = "model")]
    model_version: Option<String>,
}

/// Parses an inference response body into a result, clamping confidence.
pub fn parse_response(body: &[u8]) -> Result<ClassificationResult, InferenceError> {
    let wire: WireResponse =
        serde_json::from_slice(body).map_err(|e| InferenceError::Malformed(e.to_string()))?;

    let (prediction, envelope_version) = match wire {
        WireResponse::Single(p) => (p, None),
        WireResponse::Envelope {
            predictions,
            model_version,
        } => (best(predictions)?, model_version),
        WireResponse::Ranked(predictions) => (best(predictions)?, None),
    };

    if prediction.label.trim().is_empty() {
        return Err(InferenceError::Malformed("empty label".to_string()));
    }
    if !prediction.confidence.is_finite() {
        return Err(InferenceError::Malformed(format!(
            "confidence is not a number: {}",
            prediction.confidence
        )));
    }

    let confidence = prediction.confidence.clamp(0.0, 1.0);
    let confidence_clamped = confidence != prediction.confidence;
    if confidence_clamped {
        warn!(
            label = %prediction.label,
            reported = prediction.confidence,
            clamped = confidence,
            "Inference confidence out of range, clamped"
        );
    }

    Ok(ClassificationResult {
        label: prediction.label,
        confidence,
        model_version: prediction
            .model_version
            .or(envelope_version)
            .unwrap_or_else(|| UNKNOWN_MODEL_VERSION.to_string()),
        confidence_clamped,
    })
}

fn best(predictions: Vec<WirePrediction>) -> Result<WirePrediction, InferenceError> {
    predictions
        .into_iter()
        .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
        .ok_or_else(|| InferenceError::Malformed("no predictions".to_string()))
}

/// Client for a classification endpoint that takes a raw image body.
pub struct InferenceClient<C: AsyncHttpClient> {
    http_client: C,
    endpoint: String,
    token: Option<String>,
    timeout: Duration,
    retry: RetryPolicy,
}

impl<C: AsyncHttpClient> InferenceClient<C> {
    pub fn new(http_client: C, endpoint: impl Into<String>) -> Self {
        Self {
            http_client,
            endpoint: endpoint.into(),
            token: None,
            timeout: Duration::from_secs(DEFAULT_INFERENCE_TIMEOUT_SECS),
            retry: RetryPolicy::none()
                .with_max_retries(1)
                .with_base_delay(Duration::ZERO),
        }
    }

    /// Sends `Authorization: Bearer <token>` with each request.
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.trim().is_empty());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Classifies one image.
    ///
    /// The format is checked locally first; unsupported payloads never reach
    /// the network. A timed-out request is repeated once with the same
    /// payload, other failures are returned as-is.
    pub async fn classify(&self, image: &[u8]) -> Result<ClassificationResult, InferenceError> {
        let format = ImageFormat::sniff(image)
            .ok_or_else(|| InferenceError::UnsupportedFormat(describe_unknown(image)))?;

        let result = self
            .retry
            .run("inference", |attempt| self.submit(image, format, attempt))
            .await?;

        info!(
            label = %result.label,
            confidence = result.confidence,
            model_version = %result.model_version,
            "Image classified"
        );
        Ok(result)
    }

    async fn submit(
        &self,
        image: &[u8],
        format: ImageFormat,
        attempt: u32,
    ) -> Result<ClassificationResult, InferenceError> {
        debug!(
            url = %self.endpoint,
            format = %format,
            bytes = image.len(),
            attempt = attempt,
            "Submitting image for classification"
        );

        let bearer = self.token.as_ref().map(|t| format!("Bearer {}", t));
        let mut headers = vec![("Accept", "application/json")];
        if let Some(bearer) = bearer.as_deref() {
            headers.push(("Authorization", bearer));
        }

        let timeout_secs = self.timeout.as_secs();
        let body = tokio::time::timeout(
            self.timeout,
            self.http_client
                .post_bytes(&self.endpoint, format.content_type(), image, &headers),
        )
        .await
        .map_err(|_| InferenceError::Timeout {
            url: self.endpoint.clone(),
            timeout_secs,
        })?
        .map_err(|e| InferenceError::from_http(e, timeout_secs))?;

        parse_response(&body)
    }
}
