//! Flow metrics.

use metrics::counter;

/// Metric name constants for consistency.
pub mod names {
    /// Finished submission cycles by outcome.
    pub const CYCLES_TOTAL: &str = "safewatch_flow_cycles_total";

    /// Responses dropped because a newer cycle replaced theirs.
    pub const STALE_RESPONSES_TOTAL: &str = "safewatch_flow_stale_responses_total";

    /// Display URLs released.
    pub const URLS_RELEASED_TOTAL: &str = "safewatch_flow_urls_released_total";
}

/// Record a cycle that reached a terminal state.
pub fn record_cycle(outcome: &str) {
    counter!(names::CYCLES_TOTAL, "outcome" => outcome.to_string()).increment(1);
}

/// Record a discarded stale response.
pub fn record_stale_response() {
    counter!(names::STALE_RESPONSES_TOTAL).increment(1);
}

/// Record released display URLs.
pub fn record_urls_released(count: usize) {
    if count > 0 {
        counter!(names::URLS_RELEASED_TOTAL).increment(count as u64);
    }
}
