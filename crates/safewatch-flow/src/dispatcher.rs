//! Violation notification dispatch.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::task::JoinHandle;
use tracing::{info, warn};

use safewatch_client::{NotificationClient, NotifyError};
use safewatch_models::{CycleId, ViolationSummary};

/// Fires at most one best-effort notification per submission cycle.
pub struct NotificationDispatcher {
    client: Arc<NotificationClient>,
    last_dispatched: Mutex<Option<CycleId>>,
}

impl NotificationDispatcher {
    pub fn new(client: Arc<NotificationClient>) -> Self {
        Self {
            client,
            last_dispatched: Mutex::new(None),
        }
    }

    /// Send a report for `summary` if it has violations and `cycle` has not
    /// been reported yet.
    ///
    /// The request runs on its own task; failures are logged and dropped.
    /// The handle is returned for callers that want to wait for it.
    pub fn dispatch(&self, cycle: CycleId, summary: &ViolationSummary) -> Option<JoinHandle<()>> {
        if !summary.has_violations() {
            return None;
        }

        {
            let mut last = self
                .last_dispatched
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if matches!(*last, Some(previous) if previous >= cycle) {
                return None;
            }
            *last = Some(cycle);
        }

        let client = Arc::clone(&self.client);
        let request = client.violation_report(summary);
        let total = summary.total();

        Some(tokio::spawn(async move {
            match client.send(&request).await {
                Ok(()) => info!(cycle = %cycle, violations = total, "Violation notification sent"),
                Err(NotifyError::NoRecipients) => {
                    warn!(
                        cycle = %cycle,
                        "Violations detected but no notification recipients configured"
                    )
                }
                Err(e) => warn!(cycle = %cycle, "Violation notification failed: {}", e),
            }
        }))
    }
}
