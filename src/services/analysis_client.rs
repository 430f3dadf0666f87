// Analysis Client
// Sends one classification request per submission to the detection backend

use async_trait::async_trait;
use chrono::Utc;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Url};
use serde::Serialize;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{info, warn};

use crate::models::{AnalysisResult, ContentKind, ContentPayload, ContentSubmission, FileUpload};
use super::config_store::{AppConfig, ConfigurationError};
use super::normalize::normalize_response;

/// Any failure of a classification call: transport, non-2xx status or a
/// body that is not JSON.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Analysis failed: {detail}")]
pub struct AnalysisFailure {
    pub detail: String,
}

impl AnalysisFailure {
    pub fn new(detail: impl Into<String>) -> Self {
        Self { detail: detail.into() }
    }
}

#[derive(Error, Debug)]
enum TransportError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Backend error: {status} - {message}")]
    Status { status: u16, message: String },
    #[error("Response is not JSON: {0}")]
    Json(String),
    #[error("Payload does not match {0} route")]
    PayloadShape(ContentKind),
    #[error("Submission has no payload")]
    MissingPayload,
}

impl From<TransportError> for AnalysisFailure {
    fn from(err: TransportError) -> Self {
        AnalysisFailure::new(err.to_string())
    }
}

/// Seam between the session controller and whatever produces results.
#[async_trait]
pub trait ContentAnalyzer: Send + Sync {
    async fn analyze(&self, submission: &ContentSubmission) -> Result<AnalysisResult, AnalysisFailure>;
}

#[derive(Debug, Serialize)]
struct TextRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Clone)]
pub struct AnalysisClient {
    client: Client,
    base_url: Url,
}

impl AnalysisClient {
    /// Client with the transport's default timeout.
    pub fn new(base_url: Url) -> Self {
        Self {
            client: Client::new(),
            base_url,
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigurationError> {
        let base_url = config.backend_url()?;
        let mut builder = Client::builder();
        if let Some(secs) = config.backend.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        if let Some(proxy_url) = config.active_proxy() {
            builder = builder.proxy(reqwest::Proxy::all(proxy_url)?);
        }
        let client = builder.build()?;
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Full endpoint URL for a kind. Each kind has its own route.
    pub fn endpoint(&self, kind: ContentKind) -> Url {
        let mut url = self.base_url.clone();
        let base_path = url.path().trim_end_matches('/').to_string();
        url.set_path(&format!("{}{}", base_path, kind.route()));
        url
    }

    async fn post_text(&self, url: Url, text: &str) -> Result<reqwest::Response, TransportError> {
        Ok(self
            .client
            .post(url)
            .json(&TextRequest { text })
            .send()
            .await?)
    }

    async fn post_file(&self, url: Url, file: &FileUpload) -> Result<reqwest::Response, TransportError> {
        let part = Part::bytes(file.bytes.clone())
            .file_name(file.name.clone())
            .mime_str(&file.mime_type)?;
        let form = Form::new().part("file", part);

        Ok(self.client.post(url).multipart(form).send().await?)
    }

    async fn classify(&self, submission: &ContentSubmission) -> Result<AnalysisResult, TransportError> {
        let payload = submission.payload.as_ref().ok_or(TransportError::MissingPayload)?;
        let url = self.endpoint(submission.kind);
        let start = Instant::now();

        let response = match (submission.kind, payload) {
            (ContentKind::Text, ContentPayload::Text(text)) => self.post_text(url, text).await?,
            (ContentKind::Image | ContentKind::Video, ContentPayload::File(file)) => {
                self.post_file(url, file).await?
            }
            (kind, _) => return Err(TransportError::PayloadShape(kind)),
        };

        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                message: body,
            });
        }

        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| TransportError::Json(e.to_string()))?;

        let normalized = normalize_response(&data);
        if normalized.is_unknown() {
            warn!(kind = %submission.kind, "analysis.response_without_verdict_fields");
        }
        let latency_ms = start.elapsed().as_millis() as u64;
        let mut result = normalized.into_result().timed(latency_ms, Utc::now());
        if let ContentPayload::File(file) = payload {
            result = result.for_file(file);
        }

        info!(
            kind = %submission.kind,
            latency_ms,
            verdict = %result.verdict,
            confidence = result.confidence,
            "analysis.completed"
        );
        Ok(result)
    }
}

#[async_trait]
impl ContentAnalyzer for AnalysisClient {
    async fn analyze(&self, submission: &ContentSubmission) -> Result<AnalysisResult, AnalysisFailure> {
        let payload = submission
            .payload
            .as_ref()
            .map(|p| p.describe())
            .unwrap_or_default();
        info!(kind = %submission.kind, payload = %payload, "analysis.dispatch");
        self.classify(submission).await.map_err(|e| {
            warn!(kind = %submission.kind, error = %e, "analysis.failed");
            AnalysisFailure::from(e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::config_store::ProxyConfig;

    fn client(base: &str) -> AnalysisClient {
        AnalysisClient::new(Url::parse(base).unwrap())
    }

    #[test]
    fn test_endpoints_are_distinct_per_kind() {
        let c = client("http://127.0.0.1:8000");
        assert_eq!(c.endpoint(ContentKind::Text).as_str(), "http://127.0.0.1:8000/predict/text");
        assert_eq!(c.endpoint(ContentKind::Image).as_str(), "http://127.0.0.1:8000/predict/image");
        assert_eq!(c.endpoint(ContentKind::Video).as_str(), "http://127.0.0.1:8000/predict/video");
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let c = client("https://api.example.com/detect/");
        assert_eq!(
            c.endpoint(ContentKind::Image).as_str(),
            "https://api.example.com/detect/predict/image"
        );
    }

    #[test]
    fn test_from_config_applies_base_url() {
        let mut config = AppConfig::default();
        config.backend.base_url = "http://localhost:9000".to_string();
        config.backend.timeout_secs = Some(5);
        let c = AnalysisClient::from_config(&config).unwrap();
        assert_eq!(c.base_url().as_str(), "http://localhost:9000/");
    }

    #[test]
    fn test_from_config_with_enabled_proxy() {
        let mut config = AppConfig::default();
        config.proxy = Some(ProxyConfig {
            enabled: true,
            url: Some("http://127.0.0.1:3128".to_string()),
        });
        assert!(AnalysisClient::from_config(&config).is_ok());
    }

    #[tokio::test]
    async fn test_missing_payload_is_a_failure() {
        let c = client("http://127.0.0.1:9");
        let err = c.analyze(&ContentSubmission::new(ContentKind::Text)).await.unwrap_err();
        assert!(err.detail.contains("no payload"));
    }

    #[tokio::test]
    async fn test_mismatched_payload_is_not_sent() {
        let c = client("http://127.0.0.1:9");
        let submission = ContentSubmission::with_payload(ContentKind::Image, ContentPayload::text("hello"));
        let err = c.analyze(&submission).await.unwrap_err();
        assert!(err.detail.contains("image"));
    }
}
