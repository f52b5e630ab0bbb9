//! Repository seam over client storage.
//!
//! `fetch_unvalidated` and `has_unvalidated_after` share one predicate:
//! non-empty email with `is_email_valid == false`, ordered by ascending id.
//! The chained validation job relies on that ordering to terminate.

use crate::error::{ClientStoreError, ClientStoreResult};
use crate::model::{ClientRecord, EmailStatus};
use async_trait::async_trait;
use chrono::Utc;
use email_validation::EmailCheckResult;
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::debug;

#[async_trait]
pub trait ClientRepository: Send + Sync {
    async fn get(&self, id: i64) -> ClientStoreResult<ClientRecord>;

    async fn insert(&self, client: ClientRecord) -> ClientStoreResult<()>;

    /// Page of records still awaiting validation, ordered by id.
    async fn fetch_unvalidated(&self, offset: u64, limit: u64)
        -> ClientStoreResult<Vec<ClientRecord>>;

    /// Whether any record awaiting validation has an id greater than `id`.
    async fn has_unvalidated_after(&self, id: i64) -> ClientStoreResult<bool>;

    async fn count_unvalidated(&self) -> ClientStoreResult<u64>;

    /// Persist a validation verdict: validity flag, status, reason, the
    /// per-stage details, and the validation timestamp.
    async fn apply_validation(
        &self,
        id: i64,
        result: &EmailCheckResult,
    ) -> ClientStoreResult<()>;

    async fn set_email_status(&self, id: i64, status: EmailStatus) -> ClientStoreResult<()>;

    async fn set_provider(&self, id: i64, provider: &str) -> ClientStoreResult<()>;

    /// Record a successful delivery: status `sent` plus the sent timestamp.
    async fn mark_sent(&self, id: i64) -> ClientStoreResult<()>;
}

fn awaiting_validation(client: &ClientRecord) -> bool {
    !client.email.is_empty() && !client.is_email_valid
}

/// `BTreeMap`-backed repository. Iteration order gives the ascending-id
/// ordering the pagination contract requires.
#[derive(Default)]
pub struct InMemoryClientRepository {
    clients: RwLock<BTreeMap<i64, ClientRecord>>,
}

impl InMemoryClientRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ClientRepository for InMemoryClientRepository {
    async fn get(&self, id: i64) -> ClientStoreResult<ClientRecord> {
        self.clients
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(ClientStoreError::NotFound(id))
    }

    async fn insert(&self, client: ClientRecord) -> ClientStoreResult<()> {
        self.clients.write().await.insert(client.id, client);
        Ok(())
    }

    async fn fetch_unvalidated(
        &self,
        offset: u64,
        limit: u64,
    ) -> ClientStoreResult<Vec<ClientRecord>> {
        let clients = self.clients.read().await;
        Ok(clients
            .values()
            .filter(|c| awaiting_validation(c))
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn has_unvalidated_after(&self, id: i64) -> ClientStoreResult<bool> {
        let clients = self.clients.read().await;
        Ok(clients
            .range(id + 1..)
            .any(|(_, c)| awaiting_validation(c)))
    }

    async fn count_unvalidated(&self) -> ClientStoreResult<u64> {
        let clients = self.clients.read().await;
        Ok(clients.values().filter(|c| awaiting_validation(c)).count() as u64)
    }

    async fn apply_validation(
        &self,
        id: i64,
        result: &EmailCheckResult,
    ) -> ClientStoreResult<()> {
        let mut clients = self.clients.write().await;
        let client = clients.get_mut(&id).ok_or(ClientStoreError::NotFound(id))?;

        client.is_email_valid = result.is_valid;
        client.email_status = if result.is_valid {
            EmailStatus::Valid
        } else {
            EmailStatus::Invalid
        };
        client.email_validation_reason = Some(result.reason.clone());
        client.email_validation_details = Some(serde_json::to_value(&result.checks)?);
        client.email_last_validated_at = Some(Utc::now());
        client.email_validation_attempts += 1;

        debug!(
            client_id = id,
            is_valid = result.is_valid,
            reason = %result.reason,
            "Persisted validation result"
        );
        Ok(())
    }

    async fn set_email_status(&self, id: i64, status: EmailStatus) -> ClientStoreResult<()> {
        let mut clients = self.clients.write().await;
        let client = clients.get_mut(&id).ok_or(ClientStoreError::NotFound(id))?;
        client.email_status = status;
        Ok(())
    }

    async fn set_provider(&self, id: i64, provider: &str) -> ClientStoreResult<()> {
        let mut clients = self.clients.write().await;
        let client = clients.get_mut(&id).ok_or(ClientStoreError::NotFound(id))?;
        client.email_provider = Some(provider.to_string());
        Ok(())
    }

    async fn mark_sent(&self, id: i64) -> ClientStoreResult<()> {
        let mut clients = self.clients.write().await;
        let client = clients.get_mut(&id).ok_or(ClientStoreError::NotFound(id))?;
        client.email_status = EmailStatus::Sent;
        client.email_sent_at = Some(Utc::now());
        Ok(())
    }
}
