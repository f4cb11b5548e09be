//! Notifier port.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;

/// Delivers one alert message per cycle.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send the formatted failure list.
    async fn send(&self, body: &str) -> DomainResult<()>;
}
