//! Client error types.

use std::time::Duration;

use thiserror::Error;

pub type SubmitResult<T> = Result<T, SubmitError>;

/// Errors from submitting media to the inference backend.
#[derive(Debug, Error)]
pub enum SubmitError {
    /// No response reached us
    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    /// The backend answered with a failure status
    #[error("Server error ({status}): {detail}")]
    Server { status: u16, detail: String },

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid endpoint URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl SubmitError {
    pub fn server(status: u16, detail: impl Into<String>) -> Self {
        Self::Server {
            status,
            detail: detail.into(),
        }
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Short label used for metrics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            SubmitError::Network(_) => "network",
            SubmitError::Server { .. } => "server",
            SubmitError::Timeout(_) => "timeout",
            SubmitError::InvalidRequest(_) | SubmitError::InvalidUrl(_) => "invalid_request",
        }
    }

    /// HTTP status if the backend answered.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            SubmitError::Server { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type NotifyResult<T> = Result<T, NotifyError>;

/// Errors from the notification backend. Never fatal to the flow.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("No notification recipients configured")]
    NoRecipients,

    #[error("Notification rejected ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}
