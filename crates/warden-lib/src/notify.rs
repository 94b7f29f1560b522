//! Outbound notifications
//!
//! The orchestrator only ever calls `notify(severity, title, message)`.
//! Delivery failures are logged by `notify_best_effort` and never fail the
//! operation that triggered them.

use crate::config::NotifySettings;
use crate::error::{Result, WardenError};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Notification and alert severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// A sink for operator-facing notifications
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, severity: Severity, title: &str, message: &str) -> Result<()>;
}

/// Send a notification, logging instead of failing
pub async fn notify_best_effort(
    notifier: &dyn Notifier,
    severity: Severity,
    title: &str,
    message: &str,
) {
    if let Err(e) = notifier.notify(severity, title, message).await {
        warn!(title = %title, error = %e, "Notification delivery failed");
    }
}

/// Writes notifications to the log only
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, severity: Severity, title: &str, message: &str) -> Result<()> {
        match severity {
            Severity::Critical => error!(event = "notification", %severity, title, message),
            Severity::Warning => warn!(event = "notification", %severity, title, message),
            Severity::Info => info!(event = "notification", %severity, title, message),
        }
        Ok(())
    }
}

/// Body posted to a chat webhook
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub severity: Severity,
    pub title: String,
    pub message: String,
    pub environment: String,
    pub timestamp: String,
    /// Pre-rendered line for chat integrations that only read `text`
    pub text: String,
}

/// Posts notifications as JSON to a webhook URL
pub struct WebhookNotifier {
    client: Client,
    url: String,
    environment: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, environment: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WardenError::Notification(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            url: url.into(),
            environment: environment.into(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, severity: Severity, title: &str, message: &str) -> Result<()> {
        let payload = WebhookPayload {
            severity,
            title: title.to_string(),
            message: message.to_string(),
            environment: self.environment.clone(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            text: format!(
                "[{}] [{}] {}: {}",
                severity.to_string().to_uppercase(),
                self.environment,
                title,
                message
            ),
        };

        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| WardenError::Transport(format!("webhook request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(WardenError::Notification(format!(
                "webhook returned {}: {}",
                status, body
            )));
        }
        Ok(())
    }
}

/// Webhook notifier when configured, log-only otherwise
pub fn build_notifier(settings: &NotifySettings, environment: &str) -> Result<Arc<dyn Notifier>> {
    match &settings.webhook_url {
        Some(url) if !url.trim().is_empty() => Ok(Arc::new(WebhookNotifier::new(
            url.clone(),
            environment,
            Duration::from_secs(settings.timeout_secs),
        )?)),
        _ => Ok(Arc::new(LogNotifier)),
    }
}
