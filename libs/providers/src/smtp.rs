//! SMTP provider using lettre.
//!
//! The transport is built per send so a config change never leaves a stale
//! pooled connection behind.

use crate::config::{SmtpConfig, SmtpEncryption};
use crate::error::ProviderError;
use crate::message::{EmailMessage, Recipient, SendResult};
use crate::provider::EmailProvider;
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::time::Duration;
use uuid::Uuid;

const PROVIDER_NAME: &str = "smtp";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub struct SmtpProvider {
    config: SmtpConfig,
}

impl SmtpProvider {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }

    pub fn from_env() -> Self {
        Self::new(SmtpConfig::from_env())
    }

    fn require<'a>(
        &'a self,
        field: &'a Option<String>,
        key: &'static str,
    ) -> Result<&'a str, ProviderError> {
        field.as_deref().ok_or(ProviderError::MissingConfig {
            provider: PROVIDER_NAME,
            key,
        })
    }

    fn transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>, ProviderError> {
        let host = self.require(&self.config.host, "host")?;
        let port = self.config.port.ok_or(ProviderError::MissingConfig {
            provider: PROVIDER_NAME,
            key: "port",
        })?;
        let username = self.require(&self.config.username, "username")?;
        let password = self.require(&self.config.password, "password")?;

        let encryption = self.config.encryption.unwrap_or(SmtpEncryption::Starttls);
        let builder = match encryption {
            SmtpEncryption::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(host)
                .map_err(|e| ProviderError::transport(PROVIDER_NAME, e.to_string()))?,
            SmtpEncryption::Starttls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                .map_err(|e| ProviderError::transport(PROVIDER_NAME, e.to_string()))?,
            SmtpEncryption::None => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host),
        };

        let timeout = self.config.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);
        Ok(builder
            .credentials(Credentials::new(username.to_string(), password.to_string()))
            .port(port)
            .timeout(Some(Duration::from_secs(timeout)))
            .build())
    }

    fn build_message(
        &self,
        to: &Recipient,
        message: &EmailMessage,
    ) -> Result<Message, ProviderError> {
        let from_email = self.require(&self.config.from_email, "from_email")?;
        let from: Mailbox = match &self.config.from_name {
            Some(name) => format!("{name} <{from_email}>"),
            None => from_email.to_string(),
        }
        .parse()
        .map_err(|e| ProviderError::InvalidConfig {
            provider: PROVIDER_NAME,
            message: format!("invalid from address: {e}"),
        })?;

        let to: Mailbox = to
            .display()
            .parse()
            .map_err(|e| ProviderError::send(PROVIDER_NAME, format!("invalid recipient: {e}")))?;

        let builder = Message::builder().from(from).to(to).subject(&message.subject);

        match (&message.body_text, &message.body_html) {
            (Some(text), Some(html)) => builder
                .multipart(
                    MultiPart::alternative()
                        .singlepart(
                            SinglePart::builder()
                                .header(ContentType::TEXT_PLAIN)
                                .body(text.clone()),
                        )
                        .singlepart(
                            SinglePart::builder()
                                .header(ContentType::TEXT_HTML)
                                .body(html.clone()),
                        ),
                )
                .map_err(|e| ProviderError::send(PROVIDER_NAME, e.to_string())),
            (Some(text), None) => builder
                .header(ContentType::TEXT_PLAIN)
                .body(text.clone())
                .map_err(|e| ProviderError::send(PROVIDER_NAME, e.to_string())),
            (None, Some(html)) => builder
                .header(ContentType::TEXT_HTML)
                .body(html.clone())
                .map_err(|e| ProviderError::send(PROVIDER_NAME, e.to_string())),
            (None, None) => Err(ProviderError::send(
                PROVIDER_NAME,
                "message has neither text nor HTML body",
            )),
        }
    }
}

#[async_trait]
impl EmailProvider for SmtpProvider {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    fn validate_config(&self) -> Result<(), ProviderError> {
        self.require(&self.config.host, "host")?;
        self.config.port.ok_or(ProviderError::MissingConfig {
            provider: PROVIDER_NAME,
            key: "port",
        })?;
        self.require(&self.config.username, "username")?;
        self.require(&self.config.password, "password")?;
        self.require(&self.config.from_email, "from_email")?;
        Ok(())
    }

    async fn do_send(
        &self,
        to: &Recipient,
        message: &EmailMessage,
    ) -> Result<SendResult, ProviderError> {
        let email = self.build_message(to, message)?;

        let response = self
            .transport()?
            .send(email)
            .await
            .map_err(|e| ProviderError::transport(PROVIDER_NAME, e.to_string()))?;

        let message_id = response
            .message()
            .next()
            .map(|s| s.to_string())
            .unwrap_or_else(|| format!("smtp-{}", Uuid::new_v4()));

        Ok(SendResult { message_id })
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        let ok = self
            .transport()?
            .test_connection()
            .await
            .map_err(|e| ProviderError::transport(PROVIDER_NAME, e.to_string()))?;

        if ok {
            Ok(())
        } else {
            Err(ProviderError::transport(
                PROVIDER_NAME,
                "SMTP server rejected the connection",
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_config() -> SmtpConfig {
        SmtpConfig {
            host: Some("smtp.corp.com".into()),
            port: Some(587),
            username: Some("mailer".into()),
            password: Some("secret".into()),
            from_email: Some("noreply@corp.com".into()),
            from_name: Some("Corp CRM".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_validate_config_reports_first_missing_key() {
        let provider = SmtpProvider::new(SmtpConfig {
            port: Some(587),
            ..Default::default()
        });

        match provider.validate_config() {
            Err(ProviderError::MissingConfig { provider, key }) => {
                assert_eq!(provider, "smtp");
                assert_eq!(key, "host");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_validate_config_complete() {
        assert!(SmtpProvider::new(full_config()).validate_config().is_ok());
    }

    #[test]
    fn test_build_message_requires_body() {
        let provider = SmtpProvider::new(full_config());
        let result = provider.build_message(
            &Recipient::new("user@corp.com"),
            &EmailMessage::new("No body"),
        );
        assert!(matches!(result, Err(ProviderError::Send { .. })));
    }

    #[test]
    fn test_build_message_with_text() {
        let provider = SmtpProvider::new(full_config());
        let message = EmailMessage::new("Hi").with_text("hello");
        assert!(provider
            .build_message(&Recipient::new("user@corp.com").with_name("User"), &message)
            .is_ok());
    }
}
