//! Transactional email provider trait

use async_trait::async_trait;

use crate::error::Result;

/// Trait for sending transactional email
///
/// Implementations:
/// - `ResendClient`: Resend HTTP API
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmailProvider: Send + Sync {
    /// Send one HTML email; returns the provider's message ID
    async fn send(&self, from: &str, to: &str, subject: &str, html: &str) -> Result<String>;

    /// Provider name for logging
    fn name(&self) -> &str;
}
