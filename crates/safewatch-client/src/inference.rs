//! Inference backend HTTP client.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use futures_util::StreamExt;
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use safewatch_models::MediaAsset;

use crate::config::InferenceConfig;
use crate::error::{SubmitError, SubmitResult};
use crate::metrics;
use crate::progress::UploadProgress;

/// Multipart field carrying the media.
pub const FILE_FIELD: &str = "file";

const MAX_DETAIL_LEN: usize = 500;

/// Which detector to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionProfile {
    /// Personal protective equipment
    #[default]
    Ppe,
    /// Machine quality checkpoints
    Machine,
}

impl DetectionProfile {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionProfile::Ppe => "ppe",
            DetectionProfile::Machine => "machine",
        }
    }
}

impl fmt::Display for DetectionProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DetectionProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ppe" => Ok(DetectionProfile::Ppe),
            "machine" => Ok(DetectionProfile::Machine),
            other => Err(format!("unknown detection profile: {}", other)),
        }
    }
}

/// One media asset wrapped for transport. Immutable once built.
#[derive(Debug, Clone)]
pub struct SubmissionRequest {
    profile: DetectionProfile,
    asset: MediaAsset,
}

impl SubmissionRequest {
    pub fn new(profile: DetectionProfile, asset: MediaAsset) -> Self {
        Self { profile, asset }
    }

    pub fn profile(&self) -> DetectionProfile {
        self.profile
    }

    pub fn asset(&self) -> &MediaAsset {
        &self.asset
    }
}

/// Successful, fully received backend response.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl RawResponse {
    /// True if the content type declares JSON (`application/json`, `*+json`).
    pub fn is_json(&self) -> bool {
        self.content_type
            .as_deref()
            .and_then(|ct| ct.split(';').next())
            .map(|essence| {
                let essence = essence.trim().to_ascii_lowercase();
                essence == "application/json" || essence.ends_with("+json")
            })
            .unwrap_or(false)
    }

    /// MIME essence of the content type, if any.
    pub fn mime(&self) -> Option<&str> {
        self.content_type
            .as_deref()
            .and_then(|ct| ct.split(';').next())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Client for the detection backend.
pub struct InferenceClient {
    http: Client,
    config: InferenceConfig,
    base_url: Url,
}

impl InferenceClient {
    /// Create a new inference client.
    pub fn new(config: InferenceConfig) -> SubmitResult<Self> {
        let base_url = Url::parse(&config.base_url)?;
        let http = Client::builder().build().map_err(SubmitError::Network)?;

        Ok(Self {
            http,
            config,
            base_url,
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> SubmitResult<Self> {
        Self::new(InferenceConfig::from_env())
    }

    pub fn config(&self) -> &InferenceConfig {
        &self.config
    }

    /// Backend origin that relative media URLs are rooted at.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Full endpoint URL for a profile.
    pub fn endpoint(&self, profile: DetectionProfile) -> SubmitResult<Url> {
        let path = match profile {
            DetectionProfile::Ppe => &self.config.ppe_path,
            DetectionProfile::Machine => &self.config.machine_path,
        };
        Ok(self.base_url.join(path)?)
    }

    /// Check if the backend is reachable.
    pub async fn health_check(&self) -> bool {
        match self.http.get(self.base_url.clone()).send().await {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                warn!("Inference backend health check failed: {}", response.status());
                false
            }
            Err(e) => {
                warn!("Inference backend health check error: {}", e);
                false
            }
        }
    }

    /// Upload one asset and wait for the complete response.
    ///
    /// `progress` only reaches 100 after a successful body has been read.
    /// Nothing of a failed or timed-out response is returned.
    pub async fn submit(
        &self,
        request: &SubmissionRequest,
        progress: &UploadProgress,
    ) -> SubmitResult<RawResponse> {
        let url = self.endpoint(request.profile())?;
        let started = Instant::now();

        debug!(
            profile = %request.profile(),
            filename = %request.asset().filename,
            bytes = request.asset().len(),
            "Submitting media to {}",
            url
        );

        let result = match tokio::time::timeout(
            self.config.timeout,
            self.exchange(url, request, progress),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(SubmitError::Timeout(self.config.timeout)),
        };

        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => e.label(),
        };
        metrics::record_submission(
            request.profile().as_str(),
            outcome,
            started.elapsed().as_secs_f64(),
        );

        match &result {
            Ok(response) => info!(
                profile = %request.profile(),
                status = response.status,
                bytes = response.body.len(),
                "Submission completed in {:?}",
                started.elapsed()
            ),
            Err(e) => warn!(profile = %request.profile(), "Submission failed: {}", e),
        }

        result
    }

    async fn exchange(
        &self,
        url: Url,
        request: &SubmissionRequest,
        progress: &UploadProgress,
    ) -> SubmitResult<RawResponse> {
        let part = upload_part(request.asset(), self.config.chunk_size, progress.clone())?;
        let form = Form::new().part(FILE_FIELD, part);

        let response = self
            .http
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        progress.headers_received();

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response.bytes().await.map_err(|e| self.classify(e))?;

        if !status.is_success() {
            return Err(SubmitError::server(
                status.as_u16(),
                error_detail(status, &body),
            ));
        }

        progress.complete();

        Ok(RawResponse {
            status: status.as_u16(),
            content_type,
            body: body.to_vec(),
        })
    }

    fn classify(&self, error: reqwest::Error) -> SubmitError {
        if error.is_timeout() {
            SubmitError::Timeout(self.config.timeout)
        } else {
            SubmitError::Network(error)
        }
    }
}

/// Build the streamed file part, reporting progress as chunks are handed off.
fn upload_part(
    asset: &MediaAsset,
    chunk_size: usize,
    progress: UploadProgress,
) -> SubmitResult<Part> {
    let data = Arc::clone(&asset.data);
    let total = data.len() as u64;
    let chunk_size = chunk_size.max(1);

    let chunks = futures_util::stream::iter((0..data.len()).step_by(chunk_size)).map(
        move |start| {
            let end = (start + chunk_size).min(data.len());
            progress.record_bytes(end as u64, total);
            Ok::<_, std::io::Error>(data[start..end].to_vec())
        },
    );

    Part::stream_with_length(Body::wrap_stream(chunks), total)
        .file_name(asset.filename.clone())
        .mime_str(&asset.mime)
        .map_err(|e| SubmitError::invalid_request(format!("bad MIME type {}: {}", asset.mime, e)))
}

/// Human-readable failure detail from an error response body.
fn error_detail(status: StatusCode, body: &[u8]) -> String {
    if let Ok(serde_json::Value::Object(map)) = serde_json::from_slice::<serde_json::Value>(body) {
        for key in ["detail", "error", "message"] {
            match map.get(key) {
                Some(serde_json::Value::String(s)) if !s.is_empty() => return s.clone(),
                Some(serde_json::Value::String(_)) | Some(serde_json::Value::Null) | None => {}
                Some(other) => return other.to_string(),
            }
        }
    }

    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if !text.is_empty() {
        return text.chars().take(MAX_DETAIL_LEN).collect();
    }

    status
        .canonical_reason()
        .unwrap_or("request failed")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_parsing() {
        assert_eq!("PPE".parse::<DetectionProfile>(), Ok(DetectionProfile::Ppe));
        assert_eq!(" machine ".parse::<DetectionProfile>(), Ok(DetectionProfile::Machine));
        assert!("helmet".parse::<DetectionProfile>().is_err());
    }

    #[test]
    fn test_endpoint_join() {
        let client =
            InferenceClient::new(InferenceConfig::with_base_url("http://10.0.0.5:8000")).unwrap();
        assert_eq!(
            client.endpoint(DetectionProfile::Ppe).unwrap().as_str(),
            "http://10.0.0.5:8000/predict/"
        );
        assert_eq!(
            client.endpoint(DetectionProfile::Machine).unwrap().as_str(),
            "http://10.0.0.5:8000/predict_machine/"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let result = InferenceClient::new(InferenceConfig::with_base_url("not a url"));
        assert!(matches!(result, Err(SubmitError::InvalidUrl(_))));
    }

    #[test]
    fn test_raw_response_json_detection() {
        let response = |ct: Option<&str>| RawResponse {
            status: 200,
            content_type: ct.map(str::to_string),
            body: vec![],
        };
        assert!(response(Some("application/json")).is_json());
        assert!(response(Some("application/json; charset=utf-8")).is_json());
        assert!(response(Some("application/problem+json")).is_json());
        assert!(!response(Some("image/jpeg")).is_json());
        assert!(!response(None).is_json());
        assert_eq!(response(Some("image/png; q=1")).mime(), Some("image/png"));
    }

    #[test]
    fn test_error_detail_prefers_json_detail() {
        let detail = error_detail(StatusCode::BAD_REQUEST, br#"{"detail":"file missing"}"#);
        assert_eq!(detail, "file missing");

        let detail =
            error_detail(StatusCode::INTERNAL_SERVER_ERROR, br#"{"error":"model crashed"}"#);
        assert_eq!(detail, "model crashed");

        let detail = error_detail(
            StatusCode::UNPROCESSABLE_ENTITY,
            br#"{"detail":[{"loc":["body","file"]}]}"#,
        );
        assert!(detail.contains("body"));
    }

    #[test]
    fn test_error_detail_falls_back_to_text_and_reason() {
        assert_eq!(error_detail(StatusCode::BAD_GATEWAY, b"upstream down\n"), "upstream down");
        assert_eq!(error_detail(StatusCode::SERVICE_UNAVAILABLE, b""), "Service Unavailable");
    }
}
