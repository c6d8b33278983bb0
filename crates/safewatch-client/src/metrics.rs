//! Client metrics.
//!
//! - Submission counters by profile and outcome
//! - Upload duration histogram
//! - Notification counters by outcome

use metrics::{counter, histogram};

/// Metric name constants for consistency.
pub mod names {
    /// Total submissions by profile and outcome.
    pub const SUBMISSIONS_TOTAL: &str = "safewatch_submissions_total";

    /// Submission duration in seconds by profile.
    pub const SUBMISSION_DURATION_SECONDS: &str = "safewatch_submission_duration_seconds";

    /// Total notification requests by outcome.
    pub const NOTIFICATIONS_TOTAL: &str = "safewatch_notifications_total";
}

/// Record a finished submission.
pub fn record_submission(profile: &str, outcome: &str, duration_secs: f64) {
    counter!(
        names::SUBMISSIONS_TOTAL,
        "profile" => profile.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);

    histogram!(
        names::SUBMISSION_DURATION_SECONDS,
        "profile" => profile.to_string()
    )
    .record(duration_secs);
}

/// Record a notification attempt.
pub fn record_notification(outcome: &str) {
    counter!(
        names::NOTIFICATIONS_TOTAL,
        "outcome" => outcome.to_string()
    )
    .increment(1);
}
