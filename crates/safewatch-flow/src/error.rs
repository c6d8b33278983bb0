//! Flow error types.

use thiserror::Error;

use safewatch_client::SubmitError;
use safewatch_models::CycleId;

pub type CaptureResult<T> = Result<T, CaptureError>;

/// Errors obtaining a media asset.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Camera unavailable: {0}")]
    CameraUnavailable(String),

    #[error("Camera returned no frame")]
    NoFrame,

    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("Empty media file: {0}")]
    EmptyFile(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CaptureError {
    pub fn camera_unavailable(msg: impl Into<String>) -> Self {
        Self::CameraUnavailable(msg.into())
    }

    pub fn unsupported(mime: impl Into<String>) -> Self {
        Self::UnsupportedMediaType(mime.into())
    }
}

pub type FlowResult<T> = Result<T, FlowError>;

/// Errors surfaced by the upload flow.
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("Capture failed: {0}")]
    Capture(#[from] CaptureError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Submit(#[from] SubmitError),

    /// A newer cycle replaced this one; its outcome was discarded
    #[error("Cycle {0} was superseded by a newer action")]
    Superseded(CycleId),
}

impl FlowError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Short label used for metrics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            FlowError::Capture(_) => "capture",
            FlowError::Validation(_) => "validation",
            FlowError::Submit(e) => e.label(),
            FlowError::Superseded(_) => "superseded",
        }
    }

    /// Superseded outcomes are dropped silently instead of failing the flow.
    pub fn is_superseded(&self) -> bool {
        matches!(self, FlowError::Superseded(_))
    }
}
