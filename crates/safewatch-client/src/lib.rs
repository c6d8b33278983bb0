//! HTTP clients for the SafeWatch backends.
//!
//! This crate provides:
//! - Multipart media submission to the detection endpoints, with monotonic
//!   upload progress and a bounded wait for the response
//! - Best-effort violation notifications to the email endpoint
//! - Environment-driven configuration for both

pub mod config;
pub mod error;
pub mod inference;
pub mod metrics;
pub mod notify;
pub mod progress;

pub use config::{InferenceConfig, NotifyConfig};
pub use error::{NotifyError, NotifyResult, SubmitError, SubmitResult};
pub use inference::{DetectionProfile, InferenceClient, RawResponse, SubmissionRequest};
pub use notify::NotificationClient;
pub use progress::UploadProgress;
