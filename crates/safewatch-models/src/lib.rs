//! Shared data models for the SafeWatch upload flow.
//!
//! This crate provides Serde-serializable types for:
//! - Media assets and display URLs
//! - Detection results and violation summaries
//! - Flow states and events
//! - Notification payloads

pub mod detection;
pub mod flow;
pub mod media;
pub mod notification;

// Re-export common types
pub use detection::{Checkpoint, Detection, DetectionResult, ResultKind, ViolationSummary};
pub use flow::{CaptureMode, CycleId, FlowEvent, FlowState};
pub use media::{DisplayUrl, MediaAsset, MediaKind, LOCAL_URL_PREFIX};
pub use notification::{render_summary_table, NotificationRequest};
