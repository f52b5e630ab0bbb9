//! The provider trait.
//!
//! Implementations only supply `do_send`; the provided `send` wrapper adds
//! the attempt/success/failure logging so every transport logs uniformly.

use crate::error::ProviderError;
use crate::message::{EmailMessage, Recipient, SendResult};
use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, error, info};

/// Snapshot of a provider's readiness, for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderStatus {
    pub name: &'static str,
    pub configured: bool,
    /// Validation failure message when not configured.
    pub detail: Option<String>,
}

#[async_trait]
pub trait EmailProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Check that every required config key is present.
    fn validate_config(&self) -> Result<(), ProviderError>;

    /// Transport-specific delivery. Callers use [`EmailProvider::send`].
    async fn do_send(
        &self,
        to: &Recipient,
        message: &EmailMessage,
    ) -> Result<SendResult, ProviderError>;

    /// Deliver one message, logging the attempt and its outcome.
    async fn send(
        &self,
        to: &Recipient,
        message: &EmailMessage,
    ) -> Result<SendResult, ProviderError> {
        debug!(
            provider = self.name(),
            to = %to.email,
            subject = %message.subject,
            "Sending email"
        );

        match self.do_send(to, message).await {
            Ok(result) => {
                info!(
                    provider = self.name(),
                    to = %to.email,
                    message_id = %result.message_id,
                    "Email sent"
                );
                Ok(result)
            }
            Err(e) => {
                error!(
                    provider = self.name(),
                    to = %to.email,
                    error = %e,
                    "Email send failed"
                );
                Err(e)
            }
        }
    }

    /// Whether the provider can be used right now. The default only checks
    /// configuration; implementations may probe further.
    async fn is_available(&self) -> bool {
        self.validate_config().is_ok()
    }

    /// Actively probe the transport (SMTP handshake, API auth check).
    async fn test_connection(&self) -> Result<(), ProviderError>;

    fn status(&self) -> ProviderStatus {
        let detail = self.validate_config().err().map(|e| e.to_string());
        ProviderStatus {
            name: self.name(),
            configured: detail.is_none(),
            detail,
        }
    }
}
