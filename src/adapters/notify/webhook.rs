//! Notifier posting alerts to an HTTP webhook.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use std::time::Duration;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::Notifier;
use crate::services::alert::AlertTemplate;

/// POSTs `{"subject": ..., "text": ...}` to a fixed URL.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    http: Client,
    url: String,
    template: AlertTemplate,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, template: AlertTemplate, timeout: Duration) -> DomainResult<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("flakeguard/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DomainError::NotificationFailed(format!("HTTP client setup failed: {e}")))?;

        Ok(Self {
            http,
            url: url.into(),
            template,
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, body: &str) -> DomainResult<()> {
        let message = self.template.render(body, Utc::now());

        let resp = self
            .http
            .post(&self.url)
            .json(&message)
            .send()
            .await
            .map_err(|e| DomainError::NotificationFailed(format!("webhook request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body_text = resp.text().await.unwrap_or_default();
            return Err(DomainError::NotificationFailed(format!(
                "webhook returned {status}: {body_text}"
            )));
        }

        tracing::info!(subject = %message.subject, "alert sent");
        Ok(())
    }
}
