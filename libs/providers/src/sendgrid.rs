//! SendGrid provider over the v3 mail send API.

use crate::config::SendGridConfig;
use crate::error::ProviderError;
use crate::message::{EmailMessage, Recipient, SendResult, DEFAULT_TEXT_BODY};
use crate::provider::EmailProvider;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use uuid::Uuid;

const PROVIDER_NAME: &str = "sendgrid";
const SENDGRID_API_URL: &str = "https://api.sendgrid.com/v3/mail/send";
const SENDGRID_SCOPES_URL: &str = "https://api.sendgrid.com/v3/scopes";

pub struct SendGridProvider {
    config: SendGridConfig,
    client: Client,
}

impl SendGridProvider {
    pub fn new(config: SendGridConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    pub fn from_env() -> Self {
        Self::new(SendGridConfig::from_env())
    }

    fn api_key(&self) -> Result<&str, ProviderError> {
        self.config
            .api_key
            .as_deref()
            .ok_or(ProviderError::MissingConfig {
                provider: PROVIDER_NAME,
                key: "api_key",
            })
    }

    fn from_email(&self) -> Result<&str, ProviderError> {
        self.config
            .from_email
            .as_deref()
            .ok_or(ProviderError::MissingConfig {
                provider: PROVIDER_NAME,
                key: "from_email",
            })
    }
}

#[derive(Debug, Serialize)]
struct SendGridRequest {
    personalizations: Vec<Personalization>,
    from: EmailAddress,
    subject: String,
    content: Vec<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    categories: Vec<String>,
}

#[derive(Debug, Serialize)]
struct Personalization {
    to: Vec<EmailAddress>,
}

#[derive(Debug, Serialize)]
struct EmailAddress {
    email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

#[derive(Debug, Serialize)]
struct Content {
    #[serde(rename = "type")]
    content_type: String,
    value: String,
}

fn build_content(message: &EmailMessage) -> Vec<Content> {
    let mut content = Vec::new();

    if let Some(text) = &message.body_text {
        content.push(Content {
            content_type: "text/plain".to_string(),
            value: text.clone(),
        });
    }

    if let Some(html) = &message.body_html {
        content.push(Content {
            content_type: "text/html".to_string(),
            value: html.clone(),
        });
    }

    // SendGrid rejects empty content arrays.
    if content.is_empty() {
        content.push(Content {
            content_type: "text/plain".to_string(),
            value: DEFAULT_TEXT_BODY.to_string(),
        });
    }

    content
}

#[async_trait]
impl EmailProvider for SendGridProvider {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    fn validate_config(&self) -> Result<(), ProviderError> {
        self.api_key()?;
        self.from_email()?;
        Ok(())
    }

    async fn do_send(
        &self,
        to: &Recipient,
        message: &EmailMessage,
    ) -> Result<SendResult, ProviderError> {
        let api_key = self.api_key()?;

        let request = SendGridRequest {
            personalizations: vec![Personalization {
                to: vec![EmailAddress {
                    email: to.email.clone(),
                    name: to.name.clone(),
                }],
            }],
            from: EmailAddress {
                email: self.from_email()?.to_string(),
                name: self.config.from_name.clone(),
            },
            subject: message.subject.clone(),
            content: build_content(message),
            categories: message.tags.clone(),
        };

        let response = self
            .client
            .post(SENDGRID_API_URL)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::transport(PROVIDER_NAME, e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            // SendGrid returns the message ID in the X-Message-Id header.
            let message_id = response
                .headers()
                .get("X-Message-Id")
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string())
                .unwrap_or_else(|| format!("sendgrid-{}", Uuid::new_v4()));

            Ok(SendResult { message_id })
        } else {
            let error_body = response.text().await.unwrap_or_default();
            Err(ProviderError::Send {
                provider: PROVIDER_NAME,
                message: error_body,
                status: Some(status.as_u16()),
            })
        }
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        let api_key = self.api_key()?;

        let response = self
            .client
            .get(SENDGRID_SCOPES_URL)
            .bearer_auth(api_key)
            .send()
            .await
            .map_err(|e| ProviderError::transport(PROVIDER_NAME, e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(ProviderError::Send {
                provider: PROVIDER_NAME,
                message: "API key rejected".to_string(),
                status: Some(response.status().as_u16()),
            })
        }
    }
}
