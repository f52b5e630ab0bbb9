//! Chained email validation job.
//!
//! Each job instance handles one page of records awaiting validation and
//! reschedules itself for the next page while work remains. Termination
//! does not rely on the set shrinking: a record that validates as invalid
//! keeps `is_email_valid = false`, but it can never be "after" the last
//! processed id, so the chain still ends.

use crate::error::JobError;
use crate::queue::{JobQueue, QueueJob};
use crate::runner::JobProcessor;
use async_trait::async_trait;
use client_store::{ClientRepository, ClientStoreError};
use email_validation::EmailValidationService;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckEmailValidityJob {
    pub id: Uuid,
    /// 1-based page into the awaiting-validation set.
    pub page: u32,
    pub chunk_size: u32,
    #[serde(default)]
    pub retry_count: u32,
}

impl CheckEmailValidityJob {
    pub fn new(page: u32, chunk_size: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            page,
            chunk_size,
            retry_count: 0,
        }
    }

    /// Fresh job for the following page; retries do not carry over.
    fn next_page(&self) -> Self {
        Self::new(self.page + 1, self.chunk_size)
    }

    fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.chunk_size)
    }
}

impl QueueJob for CheckEmailValidityJob {
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

pub struct ValidityCheckProcessor {
    repository: Arc<dyn ClientRepository>,
    validator: Arc<EmailValidationService>,
    queue: Arc<dyn JobQueue<CheckEmailValidityJob>>,
    reschedule_delay: Duration,
}

impl ValidityCheckProcessor {
    pub fn new(
        repository: Arc<dyn ClientRepository>,
        validator: Arc<EmailValidationService>,
        queue: Arc<dyn JobQueue<CheckEmailValidityJob>>,
        reschedule_delay: Duration,
    ) -> Self {
        Self {
            repository,
            validator,
            queue,
            reschedule_delay,
        }
    }

    fn store_error(e: ClientStoreError) -> JobError {
        JobError::transient(e.to_string())
    }
}

#[async_trait]
impl JobProcessor<CheckEmailValidityJob> for ValidityCheckProcessor {
    #[instrument(skip(self, job), fields(page = job.page, chunk_size = job.chunk_size))]
    async fn process(&self, job: &CheckEmailValidityJob) -> Result<(), JobError> {
        let clients = self
            .repository
            .fetch_unvalidated(job.offset(), u64::from(job.chunk_size))
            .await
            .map_err(Self::store_error)?;

        if clients.is_empty() {
            info!(page = job.page, "No clients awaiting validation, chain complete");
            return Ok(());
        }

        let mut validated = 0usize;
        for client in &clients {
            let result = self.validator.validate_email(&client.email).await;

            // One bad record must not sink the whole page.
            if let Err(e) = self.repository.apply_validation(client.id, &result).await {
                warn!(
                    client_id = client.id,
                    error = %e,
                    "Failed to persist validation result, skipping record"
                );
                continue;
            }
            validated += 1;
        }

        let last_id = clients.last().map(|c| c.id).unwrap_or_default();
        info!(
            page = job.page,
            processed = clients.len(),
            persisted = validated,
            last_id,
            "Validated page"
        );

        if self
            .repository
            .has_unvalidated_after(last_id)
            .await
            .map_err(Self::store_error)?
        {
            self.queue
                .enqueue(job.next_page(), Some(self.reschedule_delay))
                .await?;
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "check_email_validity"
    }
}
