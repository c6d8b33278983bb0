//! Notification (email) backend client.

use reqwest::Client;
use tracing::debug;

use safewatch_models::{NotificationRequest, ViolationSummary};

use crate::config::NotifyConfig;
use crate::error::{NotifyError, NotifyResult};
use crate::metrics;

const MAX_BODY_LEN: usize = 500;

/// Client for the email send endpoint.
pub struct NotificationClient {
    http: Client,
    config: NotifyConfig,
}

impl NotificationClient {
    /// Create a new notification client.
    pub fn new(config: NotifyConfig) -> NotifyResult<Self> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> NotifyResult<Self> {
        Self::new(NotifyConfig::from_env())
    }

    pub fn config(&self) -> &NotifyConfig {
        &self.config
    }

    /// Violation report addressed to the configured recipients.
    pub fn violation_report(&self, summary: &ViolationSummary) -> NotificationRequest {
        NotificationRequest::violation_report(
            self.config.recipients.clone(),
            self.config.subject.clone(),
            summary,
        )
    }

    /// Send one notification. The response body is ignored on success.
    pub async fn send(&self, request: &NotificationRequest) -> NotifyResult<()> {
        let result = self.send_inner(request).await;
        metrics::record_notification(match &result {
            Ok(()) => "sent",
            Err(NotifyError::NoRecipients) => "skipped",
            Err(_) => "failed",
        });
        result
    }

    async fn send_inner(&self, request: &NotificationRequest) -> NotifyResult<()> {
        if request.to.is_empty() {
            return Err(NotifyError::NoRecipients);
        }

        debug!(
            recipients = request.to.len(),
            "Sending notification to {}",
            self.config.url
        );

        let mut builder = self.http.post(&self.config.url).json(request);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body: body.chars().take(MAX_BODY_LEN).collect(),
            });
        }

        Ok(())
    }
}
