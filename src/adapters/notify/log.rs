//! Notifier that only writes alerts to the log.

use async_trait::async_trait;
use chrono::Utc;

use crate::domain::errors::DomainResult;
use crate::domain::ports::Notifier;
use crate::services::alert::AlertTemplate;

#[derive(Debug, Clone)]
pub struct LogNotifier {
    template: AlertTemplate,
}

impl LogNotifier {
    pub const fn new(template: AlertTemplate) -> Self {
        Self { template }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, body: &str) -> DomainResult<()> {
        let message = self.template.render(body, Utc::now());
        tracing::warn!(subject = %message.subject, text = %message.text, "post-submit alert");
        Ok(())
    }
}
