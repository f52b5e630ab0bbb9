//! Mail delivery configuration.
//!
//! Settings for the delivery pipeline: which providers to prefer, the
//! default sender identity, and tuning knobs for the background jobs.
//! Provider credentials themselves are loaded by each provider's own
//! config type; this struct only carries pipeline-level settings.

use crate::{env_or_default, env_parse_or};

/// Configuration for the mail delivery pipeline.
#[derive(Debug, Clone)]
pub struct MailConfig {
    /// Provider assigned to clients that have none yet.
    pub default_provider: String,
    /// Fallback order when the assigned provider is unavailable.
    pub provider_priority: Vec<String>,
    /// Default sender address.
    pub from_email: String,
    /// Default sender display name.
    pub from_name: String,
    /// Clients fetched per validity-check chunk.
    pub validity_chunk_size: u32,
    /// Pacing delay between chained validity-check invocations, in seconds.
    pub reschedule_delay_secs: u64,
    /// Maximum attempts per job before it is marked permanently failed.
    pub max_job_attempts: u32,
    /// Base delay for the linear retry backoff, in seconds.
    pub retry_backoff_secs: u64,
    /// Hard wall-clock timeout per job invocation, in seconds.
    pub job_timeout_secs: u64,
}

impl MailConfig {
    /// Load the configuration from environment variables, applying defaults
    /// for anything unset.
    pub fn from_env() -> Self {
        let priority = env_or_default("MAIL_PROVIDER_PRIORITY", "sendgrid,mailgun,smtp");
        let provider_priority: Vec<String> = priority
            .split(',')
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();

        let default_provider = std::env::var("MAIL_DEFAULT_PROVIDER")
            .map(|v| v.trim().to_lowercase())
            .ok()
            .or_else(|| provider_priority.first().cloned())
            .unwrap_or_else(|| "sendgrid".to_string());

        Self {
            default_provider,
            provider_priority,
            from_email: env_or_default("MAIL_FROM_ADDRESS", "noreply@example.com"),
            from_name: env_or_default("MAIL_FROM_NAME", "Notifications"),
            validity_chunk_size: env_parse_or("EMAIL_VALIDITY_CHUNK_SIZE", 100),
            reschedule_delay_secs: env_parse_or("EMAIL_VALIDITY_RESCHEDULE_DELAY_SECS", 2),
            max_job_attempts: env_parse_or("EMAIL_JOB_MAX_ATTEMPTS", 3),
            retry_backoff_secs: env_parse_or("EMAIL_JOB_RETRY_BACKOFF_SECS", 30),
            job_timeout_secs: env_parse_or("EMAIL_JOB_TIMEOUT_SECS", 120),
        }
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            default_provider: "sendgrid".to_string(),
            provider_priority: vec![
                "sendgrid".to_string(),
                "mailgun".to_string(),
                "smtp".to_string(),
            ],
            from_email: "noreply@example.com".to_string(),
            from_name: "Notifications".to_string(),
            validity_chunk_size: 100,
            reschedule_delay_secs: 2,
            max_job_attempts: 3,
            retry_backoff_secs: 30,
            job_timeout_secs: 120,
        }
    }
}
