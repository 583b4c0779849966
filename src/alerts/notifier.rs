//! Notification channels for rendered alerts

use async_trait::async_trait;
use std::fmt::Debug;
use thiserror::Error;
use tracing::{debug, warn};

use crate::alerts::types::Alert;

/// Notifier errors
#[derive(Debug, Error)]
pub(crate) enum NotifierError {
    #[error("Failed to send webhook: {0}")]
    HttpRequest(#[from] reqwest::Error),

    #[error("Webhook returned status {0}")]
    Status(reqwest::StatusCode),
}

/// Delivers alerts to a notification channel
#[async_trait]
pub(crate) trait Notifier: Send + Sync + Debug {
    async fn send(&self, alert: &Alert) -> Result<(), NotifierError>;
}

/// Posts alerts as JSON to a webhook
#[derive(Debug, Clone)]
pub(crate) struct WebhookNotifier {
    http: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub(crate) fn new(http: reqwest::Client, url: String) -> Self {
        Self { http, url }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, alert: &Alert) -> Result<(), NotifierError> {
        let response = self.http.post(&self.url).json(alert).send().await?;

        if !response.status().is_success() {
            return Err(NotifierError::Status(response.status()));
        }

        debug!(target_label = %alert.target, "Webhook notification sent");
        Ok(())
    }
}

/// Writes alerts to the log; used when no webhook is configured
#[derive(Debug, Clone, Default)]
pub(crate) struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, alert: &Alert) -> Result<(), NotifierError> {
        warn!(
            subject = %alert.subject,
            target_label = %alert.target,
            "Alert triggered:\n{}",
            alert.message
        );
        Ok(())
    }
}
