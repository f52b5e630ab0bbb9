//! Per-client email send job with provider fallback.
//!
//! Status flow: `queued` -> `sending` -> `sent`, or back to `queued` when
//! an attempt fails and retries remain, or `failed` on the final attempt.
//! On each failed attempt the client's assigned provider advances to the
//! next name in the priority list so the retry lands on a different
//! transport.

use crate::error::JobError;
use crate::queue::QueueJob;
use crate::runner::JobProcessor;
use async_trait::async_trait;
use client_store::{ClientRecord, ClientRepository, EmailStatus};
use core_config::mail::MailConfig;
use mail_providers::{EmailMessage, EmailProvider, ProviderFactory, Recipient};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendClientEmailJob {
    pub id: Uuid,
    pub client_id: i64,
    pub subject: String,
    pub body_text: Option<String>,
    pub body_html: Option<String>,
    #[serde(default)]
    pub retry_count: u32,
}

impl SendClientEmailJob {
    pub fn new(client_id: i64, subject: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            client_id,
            subject: subject.into(),
            body_text: None,
            body_html: None,
            retry_count: 0,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.body_text = Some(text.into());
        self
    }

    pub fn with_html(mut self, html: impl Into<String>) -> Self {
        self.body_html = Some(html.into());
        self
    }
}

impl QueueJob for SendClientEmailJob {
    fn job_id(&self) -> String {
        self.id.to_string()
    }

    fn retry_count(&self) -> u32 {
        self.retry_count
    }

    fn with_retry(&self) -> Self {
        Self {
            retry_count: self.retry_count + 1,
            ..self.clone()
        }
    }
}

pub struct SendEmailProcessor {
    repository: Arc<dyn ClientRepository>,
    factory: Arc<ProviderFactory>,
    config: MailConfig,
}

impl SendEmailProcessor {
    pub fn new(
        repository: Arc<dyn ClientRepository>,
        factory: Arc<ProviderFactory>,
        config: MailConfig,
    ) -> Self {
        Self {
            repository,
            factory,
            config,
        }
    }

    /// Provider assigned to the client, defaulting (and persisting the
    /// default) when none is set yet.
    async fn assigned_provider(&self, client: &ClientRecord) -> Result<String, JobError> {
        match client.email_provider.as_deref() {
            Some(name) if !name.is_empty() => Ok(name.to_string()),
            _ => {
                let default = self.config.default_provider.clone();
                self.repository
                    .set_provider(client.id, &default)
                    .await
                    .map_err(|e| JobError::transient(e.to_string()))?;
                Ok(default)
            }
        }
    }

    /// Resolve the assigned provider, walking the priority list when it
    /// is unusable. A switch is persisted so the next attempt starts from
    /// the provider that was actually used.
    async fn resolve_provider(
        &self,
        client_id: i64,
        assigned: &str,
    ) -> Result<Arc<dyn EmailProvider>, JobError> {
        if let Ok(provider) = self.factory.make_from_config(assigned) {
            if provider.is_available().await {
                return Ok(provider);
            }
            warn!(
                client_id,
                provider = assigned,
                "Assigned provider unavailable, falling back"
            );
        }

        let provider = self
            .factory
            .best_available(&self.config.provider_priority)
            .await
            .map_err(|e| JobError::transient(e.to_string()))?;

        if provider.name() != assigned {
            self.repository
                .set_provider(client_id, provider.name())
                .await
                .map_err(|e| JobError::transient(e.to_string()))?;
        }
        Ok(provider)
    }

    fn next_provider_after(&self, current: &str) -> Option<&str> {
        let priority = &self.config.provider_priority;
        priority
            .iter()
            .position(|name| name == current)
            .and_then(|i| priority.get(i + 1))
            .map(String::as_str)
    }

    /// Bookkeeping for a failed attempt. Returns the error the runner
    /// should see: transient while retries remain, permanent on the final
    /// attempt.
    async fn handle_failure(
        &self,
        job: &SendClientEmailJob,
        provider_name: &str,
        cause: String,
    ) -> JobError {
        let attempt = job.retry_count + 1;
        error!(
            client_id = job.client_id,
            provider = provider_name,
            attempt,
            max_attempts = self.config.max_job_attempts,
            error = %cause,
            "Send attempt failed"
        );

        if attempt < self.config.max_job_attempts {
            if let Some(next) = self.next_provider_after(provider_name) {
                info!(
                    client_id = job.client_id,
                    from = provider_name,
                    to = next,
                    "Advancing to next provider for retry"
                );
                if let Err(e) = self.repository.set_provider(job.client_id, next).await {
                    warn!(client_id = job.client_id, error = %e, "Failed to persist provider switch");
                }
            }
            if let Err(e) = self
                .repository
                .set_email_status(job.client_id, EmailStatus::Queued)
                .await
            {
                warn!(client_id = job.client_id, error = %e, "Failed to reset status to queued");
            }
            JobError::transient(cause)
        } else {
            if let Err(e) = self
                .repository
                .set_email_status(job.client_id, EmailStatus::Failed)
                .await
            {
                warn!(client_id = job.client_id, error = %e, "Failed to mark send as failed");
            }
            JobError::permanent(cause)
        }
    }
}

#[async_trait]
impl JobProcessor<SendClientEmailJob> for SendEmailProcessor {
    #[instrument(skip(self, job), fields(client_id = job.client_id))]
    async fn process(&self, job: &SendClientEmailJob) -> Result<(), JobError> {
        let client = match self.repository.get(job.client_id).await {
            Ok(client) => client,
            Err(client_store::ClientStoreError::NotFound(id)) => {
                return Err(JobError::permanent(format!("client {id} no longer exists")));
            }
            Err(e) => return Err(JobError::transient(e.to_string())),
        };

        let assigned = self.assigned_provider(&client).await?;

        self.repository
            .set_email_status(job.client_id, EmailStatus::Sending)
            .await
            .map_err(|e| JobError::transient(e.to_string()))?;

        let provider = match self.resolve_provider(job.client_id, &assigned).await {
            Ok(provider) => provider,
            Err(e) => return Err(self.handle_failure(job, &assigned, e.to_string()).await),
        };

        let mut recipient = Recipient::new(client.email.clone());
        if !client.name.is_empty() {
            recipient = recipient.with_name(client.name.clone());
        }

        let mut message = EmailMessage::new(job.subject.clone());
        message.body_text = job.body_text.clone();
        message.body_html = job.body_html.clone();

        match provider.send(&recipient, &message).await {
            Ok(result) => {
                self.repository
                    .mark_sent(job.client_id)
                    .await
                    .map_err(|e| JobError::transient(e.to_string()))?;
                info!(
                    client_id = job.client_id,
                    provider = provider.name(),
                    message_id = %result.message_id,
                    "Client email sent"
                );
                Ok(())
            }
            Err(e) => Err(self.handle_failure(job, provider.name(), e.to_string()).await),
        }
    }

    fn name(&self) -> &'static str {
        "send_client_email"
    }

    /// Last word on the record: whatever else happened, a permanently
    /// failed job leaves the client marked `failed`.
    async fn on_permanent_failure(&self, job: &SendClientEmailJob) {
        if let Err(e) = self
            .repository
            .set_email_status(job.client_id, EmailStatus::Failed)
            .await
        {
            error!(
                client_id = job.client_id,
                error = %e,
                "Failed to record permanent send failure"
            );
        }
    }
}
