//! Email delivery providers.
//!
//! Every transport (SMTP, SendGrid, Mailgun) implements [`EmailProvider`].
//! Callers go through the [`ProviderFactory`], which merges configuration,
//! caches instances, and falls back across providers in priority order.

pub mod config;
pub mod error;
pub mod factory;
pub mod mailgun;
pub mod message;
pub mod mock;
pub mod provider;
pub mod sendgrid;
pub mod smtp;

pub use config::{
    MailgunConfig, MailgunRegion, ProviderConfig, SendGridConfig, SmtpConfig, SmtpEncryption,
};
pub use error::ProviderError;
pub use factory::ProviderFactory;
pub use mailgun::MailgunProvider;
pub use message::{EmailMessage, Recipient, SendResult};
pub use mock::MockProvider;
pub use provider::{EmailProvider, ProviderStatus};
pub use sendgrid::SendGridProvider;
pub use smtp::SmtpProvider;
