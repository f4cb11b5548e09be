//! Alert message formatting.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use tracing::warn;

use crate::domain::models::{Failure, NotifierConfig};
use crate::domain::ports::ResultAccessor;

/// One line per failure: `{job} failed: {details_url}`.
pub fn format_failures(failures: &[Failure], accessor: &dyn ResultAccessor) -> String {
    failures
        .iter()
        .map(|failure| {
            format!(
                "{} failed: {}",
                failure.job,
                accessor.details_url(&failure.job, failure.run)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Fixed framing around the failure list of every alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertTemplate {
    pub subject: String,
    pub prologue: String,
    pub epilogue: String,
    /// Zone the send time is shown in.
    pub time_zone: Tz,
}

/// A rendered alert ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertMessage {
    pub subject: String,
    pub text: String,
}

impl AlertTemplate {
    /// Wrap `body` with the prologue and epilogue, stamping the subject
    /// with the send time in the template's zone.
    pub fn render(&self, body: &str, sent_at: DateTime<Utc>) -> AlertMessage {
        AlertMessage {
            subject: format!(
                "{}{}",
                self.subject,
                sent_at.with_timezone(&self.time_zone).format("%Y-%m-%d %H:%M:%S %Z")
            ),
            text: format!("{}{}\n{}", self.prologue, body, self.epilogue),
        }
    }
}

impl From<&NotifierConfig> for AlertTemplate {
    fn from(config: &NotifierConfig) -> Self {
        let time_zone = config.time_zone.parse().unwrap_or_else(|_| {
            warn!(time_zone = %config.time_zone, "unknown time zone, stamping alerts in UTC");
            Tz::UTC
        });
        Self {
            subject: config.subject.clone(),
            prologue: config.prologue.clone(),
            epilogue: config.epilogue.clone(),
            time_zone,
        }
    }
}
