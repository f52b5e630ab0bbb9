//! Provider configuration.
//!
//! Every field is optional so partial overrides can be merged over
//! environment defaults; required fields are enforced by each provider's
//! `validate_config`, not at construction.

use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmtpEncryption {
    None,
    Starttls,
    Tls,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub encryption: Option<SmtpEncryption>,
    pub timeout_secs: Option<u64>,
    pub from_email: Option<String>,
    pub from_name: Option<String>,
}

impl SmtpConfig {
    /// Defaults from `SMTP_*` and `MAIL_FROM_*` environment variables.
    pub fn from_env() -> Self {
        Self {
            host: env_opt("SMTP_HOST"),
            port: env_opt("SMTP_PORT").and_then(|v| v.parse().ok()),
            username: env_opt("SMTP_USERNAME"),
            password: env_opt("SMTP_PASSWORD"),
            encryption: env_opt("SMTP_ENCRYPTION").and_then(|v| match v.as_str() {
                "none" => Some(SmtpEncryption::None),
                "starttls" => Some(SmtpEncryption::Starttls),
                "tls" | "ssl" => Some(SmtpEncryption::Tls),
                _ => None,
            }),
            timeout_secs: env_opt("SMTP_TIMEOUT_SECS").and_then(|v| v.parse().ok()),
            from_email: env_opt("MAIL_FROM_ADDRESS"),
            from_name: env_opt("MAIL_FROM_NAME"),
        }
    }

    /// Field-wise merge; set fields in `overrides` win.
    pub fn merged_with(self, overrides: SmtpConfig) -> Self {
        Self {
            host: overrides.host.or(self.host),
            port: overrides.port.or(self.port),
            username: overrides.username.or(self.username),
            password: overrides.password.or(self.password),
            encryption: overrides.encryption.or(self.encryption),
            timeout_secs: overrides.timeout_secs.or(self.timeout_secs),
            from_email: overrides.from_email.or(self.from_email),
            from_name: overrides.from_name.or(self.from_name),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SendGridConfig {
    pub api_key: Option<String>,
    pub from_email: Option<String>,
    pub from_name: Option<String>,
}

impl SendGridConfig {
    pub fn from_env() -> Self {
        Self {
            api_key: env_opt("SENDGRID_API_KEY"),
            from_email: env_opt("SENDGRID_FROM_EMAIL").or_else(|| env_opt("MAIL_FROM_ADDRESS")),
            from_name: env_opt("SENDGRID_FROM_NAME").or_else(|| env_opt("MAIL_FROM_NAME")),
        }
    }

    pub fn merged_with(self, overrides: SendGridConfig) -> Self {
        Self {
            api_key: overrides.api_key.or(self.api_key),
            from_email: overrides.from_email.or(self.from_email),
            from_name: overrides.from_name.or(self.from_name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MailgunRegion {
    Us,
    Eu,
}

impl MailgunRegion {
    pub fn base_url(&self) -> &'static str {
        match self {
            MailgunRegion::Us => "https://api.mailgun.net",
            MailgunRegion::Eu => "https://api.eu.mailgun.net",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MailgunConfig {
    pub api_key: Option<String>,
    pub domain: Option<String>,
    pub region: Option<MailgunRegion>,
    pub from_email: Option<String>,
    pub from_name: Option<String>,
    pub track_clicks: Option<bool>,
    pub track_opens: Option<bool>,
}

impl MailgunConfig {
    pub fn from_env() -> Self {
        Self {
            api_key: env_opt("MAILGUN_API_KEY"),
            domain: env_opt("MAILGUN_DOMAIN"),
            region: env_opt("MAILGUN_REGION").and_then(|v| match v.as_str() {
                "us" => Some(MailgunRegion::Us),
                "eu" => Some(MailgunRegion::Eu),
                _ => None,
            }),
            from_email: env_opt("MAILGUN_FROM_EMAIL").or_else(|| env_opt("MAIL_FROM_ADDRESS")),
            from_name: env_opt("MAILGUN_FROM_NAME").or_else(|| env_opt("MAIL_FROM_NAME")),
            track_clicks: env_opt("MAILGUN_TRACK_CLICKS").map(|v| v == "true" || v == "1"),
            track_opens: env_opt("MAILGUN_TRACK_OPENS").map(|v| v == "true" || v == "1"),
        }
    }

    pub fn merged_with(self, overrides: MailgunConfig) -> Self {
        Self {
            api_key: overrides.api_key.or(self.api_key),
            domain: overrides.domain.or(self.domain),
            region: overrides.region.or(self.region),
            from_email: overrides.from_email.or(self.from_email),
            from_name: overrides.from_name.or(self.from_name),
            track_clicks: overrides.track_clicks.or(self.track_clicks),
            track_opens: overrides.track_opens.or(self.track_opens),
        }
    }
}

/// Per-provider configuration, as passed to the factory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum ProviderConfig {
    Smtp(SmtpConfig),
    Sendgrid(SendGridConfig),
    Mailgun(MailgunConfig),
}

impl ProviderConfig {
    /// Merge environment defaults under these overrides. Set override
    /// fields always win.
    pub fn merged_with_defaults(self) -> Self {
        match self {
            ProviderConfig::Smtp(c) => ProviderConfig::Smtp(SmtpConfig::from_env().merged_with(c)),
            ProviderConfig::Sendgrid(c) => {
                ProviderConfig::Sendgrid(SendGridConfig::from_env().merged_with(c))
            }
            ProviderConfig::Mailgun(c) => {
                ProviderConfig::Mailgun(MailgunConfig::from_env().merged_with(c))
            }
        }
    }

    /// Stable-within-process fingerprint, used as the factory cache key.
    pub fn config_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }
}
