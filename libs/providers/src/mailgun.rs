//! Mailgun provider over the v3 messages API.
//!
//! Mailgun takes form-encoded payloads with basic auth (`api` as the
//! username). The API host depends on the account's region.

use crate::config::{MailgunConfig, MailgunRegion};
use crate::error::ProviderError;
use crate::message::{EmailMessage, Recipient, SendResult};
use crate::provider::EmailProvider;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use uuid::Uuid;

const PROVIDER_NAME: &str = "mailgun";

pub struct MailgunProvider {
    config: MailgunConfig,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct MailgunResponse {
    id: Option<String>,
}

impl MailgunProvider {
    pub fn new(config: MailgunConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    pub fn from_env() -> Self {
        Self::new(MailgunConfig::from_env())
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

    fn domain(&self) -> Result<&str, ProviderError> {
        self.config
            .domain
            .as_deref()
            .ok_or(ProviderError::MissingConfig {
                provider: PROVIDER_NAME,
                key: "domain",
            })
    }

    fn base_url(&self) -> &'static str {
        self.config.region.unwrap_or(MailgunRegion::Us).base_url()
    }

    fn messages_url(&self) -> Result<String, ProviderError> {
        Ok(format!("{}/v3/{}/messages", self.base_url(), self.domain()?))
    }

    fn from_header(&self) -> Result<String, ProviderError> {
        let email = self
            .config
            .from_email
            .as_deref()
            .ok_or(ProviderError::MissingConfig {
                provider: PROVIDER_NAME,
                key: "from_email",
            })?;
        Ok(match &self.config.from_name {
            Some(name) if !name.is_empty() => format!("{name} <{email}>"),
            _ => email.to_string(),
        })
    }

    fn build_form(
        &self,
        to: &Recipient,
        message: &EmailMessage,
    ) -> Result<Vec<(String, String)>, ProviderError> {
        let mut form = vec![
            ("from".to_string(), self.from_header()?),
            ("to".to_string(), to.display()),
            ("subject".to_string(), message.subject.clone()),
        ];

        if let Some(text) = &message.body_text {
            form.push(("text".to_string(), text.clone()));
        }
        if let Some(html) = &message.body_html {
            form.push(("html".to_string(), html.clone()));
        }

        if let Some(clicks) = self.config.track_clicks {
            form.push((
                "o:tracking-clicks".to_string(),
                if clicks { "yes" } else { "no" }.to_string(),
            ));
        }
        if let Some(opens) = self.config.track_opens {
            form.push((
                "o:tracking-opens".to_string(),
                if opens { "yes" } else { "no" }.to_string(),
            ));
        }

        for (name, value) in &message.headers {
            form.push((format!("h:{name}"), value.clone()));
        }
        for tag in &message.tags {
            form.push(("o:tag".to_string(), tag.clone()));
        }

        Ok(form)
    }
}

#[async_trait]
impl EmailProvider for MailgunProvider {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    fn validate_config(&self) -> Result<(), ProviderError> {
        self.api_key()?;
        self.domain()?;
        self.from_header()?;
        Ok(())
    }

    async fn do_send(
        &self,
        to: &Recipient,
        message: &EmailMessage,
    ) -> Result<SendResult, ProviderError> {
        let url = self.messages_url()?;
        let form = self.build_form(to, message)?;

        let response = self
            .client
            .post(&url)
            .basic_auth("api", Some(self.api_key()?))
            .form(&form)
            .send()
            .await
            .map_err(|e| ProviderError::transport(PROVIDER_NAME, e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            let message_id = response
                .json::<MailgunResponse>()
                .await
                .ok()
                .and_then(|r| r.id)
                .unwrap_or_else(|| format!("mailgun-{}", Uuid::new_v4()));

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
        let url = format!("{}/v3/domains/{}", self.base_url(), self.domain()?);

        let response = self
            .client
            .get(&url)
            .basic_auth("api", Some(self.api_key()?))
            .send()
            .await
            .map_err(|e| ProviderError::transport(PROVIDER_NAME, e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(ProviderError::Send {
                provider: PROVIDER_NAME,
                message: "domain lookup rejected".to_string(),
                status: Some(response.status().as_u16()),
            })
        }
    }
}
