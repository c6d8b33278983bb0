//! Capture, submission and result reconciliation for the safety dashboard.
//!
//! This crate provides:
//! - Capture sources (chosen files and camera snapshots)
//! - A display URL registry with explicit allocate/revoke
//! - Reconciliation of raw detection responses into results
//! - Violation notification dispatch, at most once per cycle
//! - The [`UploadFlow`] state machine tying them together

pub mod capture;
pub mod dispatcher;
pub mod error;
pub mod metrics;
pub mod reconciler;
pub mod registry;
pub mod upload;

pub use capture::{Camera, CapturedMedia, FrameFileCamera};
pub use dispatcher::NotificationDispatcher;
pub use error::{CaptureError, CaptureResult, FlowError, FlowResult};
pub use reconciler::Reconciler;
pub use registry::{DisplayUrlRegistry, RegisteredMedia};
pub use upload::{CompletedSubmission, SubmissionOutcome, UploadFlow};
