//! Client configuration.

use std::time::Duration;

/// Default backend origin.
pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:8000";

/// Configuration for the inference backend.
#[derive(Debug, Clone)]
pub struct InferenceConfig {
    /// Backend origin; relative media URLs are resolved against it
    pub base_url: String,
    /// PPE detection endpoint path
    pub ppe_path: String,
    /// Machine checkpoint endpoint path
    pub machine_path: String,
    /// Upper bound for one upload including the response body
    pub timeout: Duration,
    /// Upload chunk size in bytes
    pub chunk_size: usize,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BACKEND_URL.to_string(),
            ppe_path: "/predict/".to_string(),
            machine_path: "/predict_machine/".to_string(),
            timeout: Duration::from_secs(120),
            chunk_size: 64 * 1024,
        }
    }
}

impl InferenceConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("SAFEWATCH_BACKEND_URL").unwrap_or(defaults.base_url),
            ppe_path: std::env::var("SAFEWATCH_PPE_PATH").unwrap_or(defaults.ppe_path),
            machine_path: std::env::var("SAFEWATCH_MACHINE_PATH").unwrap_or(defaults.machine_path),
            timeout: std::env::var("SAFEWATCH_UPLOAD_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            chunk_size: defaults.chunk_size,
        }
    }

    /// Config pointing at a specific backend, other fields default.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }
}

/// Configuration for the notification (email) backend.
#[derive(Debug, Clone)]
pub struct NotifyConfig {
    /// Email send endpoint
    pub url: String,
    /// Recipient addresses
    pub recipients: Vec<String>,
    /// Subject line for violation reports
    pub subject: String,
    /// Optional bearer token
    pub api_key: Option<String>,
    /// Request timeout
    pub timeout: Duration,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            url: format!("{}/send-email/", DEFAULT_BACKEND_URL),
            recipients: Vec::new(),
            subject: "Safety violation alert".to_string(),
            api_key: None,
            timeout: Duration::from_secs(15),
        }
    }
}

impl NotifyConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            url: std::env::var("SAFEWATCH_NOTIFY_URL").unwrap_or(defaults.url),
            recipients: std::env::var("SAFEWATCH_NOTIFY_RECIPIENTS")
                .map(|s| parse_recipients(&s))
                .unwrap_or_default(),
            subject: std::env::var("SAFEWATCH_NOTIFY_SUBJECT").unwrap_or(defaults.subject),
            api_key: std::env::var("SAFEWATCH_NOTIFY_API_KEY")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            timeout: std::env::var("SAFEWATCH_NOTIFY_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
        }
    }
}

/// Split a comma separated recipient list, dropping blanks.
pub fn parse_recipients(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
