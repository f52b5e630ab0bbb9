//! Mock provider that captures sent messages, for tests.

use crate::error::ProviderError;
use crate::message::{EmailMessage, Recipient, SendResult};
use crate::provider::EmailProvider;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
pub struct CapturedMessage {
    pub to: Recipient,
    pub message: EmailMessage,
}

pub struct MockProvider {
    name: &'static str,
    sent: Arc<Mutex<Vec<CapturedMessage>>>,
    /// Remaining sends that fail. `u32::MAX` means always fail.
    failures_left: AtomicU32,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::named("mock")
    }

    /// Mock that impersonates a real provider, for factory tests.
    pub fn named(name: &'static str) -> Self {
        Self {
            name,
            sent: Arc::new(Mutex::new(Vec::new())),
            failures_left: AtomicU32::new(0),
        }
    }

    /// Mock whose sends always fail.
    pub fn failing(name: &'static str) -> Self {
        let provider = Self::named(name);
        provider.failures_left.store(u32::MAX, Ordering::SeqCst);
        provider
    }

    /// Mock whose first `n` sends fail, then succeed.
    pub fn fail_times(name: &'static str, n: u32) -> Self {
        let provider = Self::named(name);
        provider.failures_left.store(n, Ordering::SeqCst);
        provider
    }

    pub async fn sent_messages(&self) -> Vec<CapturedMessage> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    pub async fn was_sent_to(&self, email: &str) -> bool {
        self.sent.lock().await.iter().any(|m| m.to.email == email)
    }

    fn take_failure(&self) -> bool {
        let left = self.failures_left.load(Ordering::SeqCst);
        if left == 0 {
            return false;
        }
        if left != u32::MAX {
            self.failures_left.fetch_sub(1, Ordering::SeqCst);
        }
        true
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmailProvider for MockProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    fn validate_config(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    async fn do_send(
        &self,
        to: &Recipient,
        message: &EmailMessage,
    ) -> Result<SendResult, ProviderError> {
        if self.take_failure() {
            return Err(ProviderError::send(self.name, "simulated failure"));
        }

        let mut sent = self.sent.lock().await;
        sent.push(CapturedMessage {
            to: to.clone(),
            message: message.clone(),
        });

        Ok(SendResult {
            message_id: format!("{}-{}", self.name, sent.len()),
        })
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        Ok(())
    }
}
