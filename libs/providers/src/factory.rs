//! Provider factory.
//!
//! Resolution order: explicit overrides merged over environment defaults,
//! instances cached by `(name, config fingerprint)`. `best_available` walks
//! the caller's priority list and then any remaining registered providers.

use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::mailgun::MailgunProvider;
use crate::provider::{EmailProvider, ProviderStatus};
use crate::sendgrid::SendGridProvider;
use crate::smtp::SmtpProvider;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, warn};

type ProviderBuilder =
    Arc<dyn Fn(Option<ProviderConfig>) -> Result<Arc<dyn EmailProvider>, ProviderError> + Send + Sync>;

#[derive(Default)]
pub struct ProviderFactory {
    /// Builders in registration order; order matters for `best_available`.
    builders: RwLock<Vec<(String, ProviderBuilder)>>,
    cache: RwLock<HashMap<(String, u64), Arc<dyn EmailProvider>>>,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

impl ProviderFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Factory with the three built-in transports registered.
    pub fn with_defaults() -> Self {
        let factory = Self::new();

        factory.register("smtp", |config| {
            let config = match config {
                Some(ProviderConfig::Smtp(c)) => c,
                None => crate::config::SmtpConfig::from_env(),
                Some(other) => return Err(mismatch("smtp", &other)),
            };
            Ok(Arc::new(SmtpProvider::new(config)))
        });

        factory.register("sendgrid", |config| {
            let config = match config {
                Some(ProviderConfig::Sendgrid(c)) => c,
                None => crate::config::SendGridConfig::from_env(),
                Some(other) => return Err(mismatch("sendgrid", &other)),
            };
            Ok(Arc::new(SendGridProvider::new(config)))
        });

        factory.register("mailgun", |config| {
            let config = match config {
                Some(ProviderConfig::Mailgun(c)) => c,
                None => crate::config::MailgunConfig::from_env(),
                Some(other) => return Err(mismatch("mailgun", &other)),
            };
            Ok(Arc::new(MailgunProvider::new(config)))
        });

        factory
    }

    /// Register a provider builder under `name`. Re-registering a name
    /// replaces the previous builder and drops its cached instances.
    pub fn register<F>(&self, name: impl Into<String>, builder: F)
    where
        F: Fn(Option<ProviderConfig>) -> Result<Arc<dyn EmailProvider>, ProviderError>
            + Send
            + Sync
            + 'static,
    {
        let name = name.into();
        let mut builders = write(&self.builders);

        write(&self.cache).retain(|(cached, _), _| cached != &name);
        if let Some(slot) = builders.iter_mut().find(|(n, _)| n == &name) {
            slot.1 = Arc::new(builder);
        } else {
            builders.push((name, Arc::new(builder)));
        }
    }

    pub fn registered_names(&self) -> Vec<String> {
        read(&self.builders).iter().map(|(n, _)| n.clone()).collect()
    }

    /// Resolve a provider by name with optional overrides. Overrides are
    /// merged over environment defaults; instances are cached per final
    /// configuration.
    pub fn make(
        &self,
        name: &str,
        overrides: Option<ProviderConfig>,
    ) -> Result<Arc<dyn EmailProvider>, ProviderError> {
        let builder = read(&self.builders)
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, b)| b.clone())
            .ok_or_else(|| ProviderError::UnknownProvider(name.to_string()))?;

        let config = overrides.map(ProviderConfig::merged_with_defaults);
        let key = (
            name.to_string(),
            config.as_ref().map(ProviderConfig::config_hash).unwrap_or(0),
        );

        if let Some(provider) = read(&self.cache).get(&key) {
            return Ok(provider.clone());
        }

        let provider = builder(config)?;
        write(&self.cache).insert(key, provider.clone());
        debug!(provider = name, "Built provider instance");
        Ok(provider)
    }

    /// Resolve a provider from environment configuration only.
    pub fn make_from_config(&self, name: &str) -> Result<Arc<dyn EmailProvider>, ProviderError> {
        self.make(name, None)
    }

    /// First usable provider: the `preferred` names in order, then any
    /// other registered provider in registration order.
    pub async fn best_available(
        &self,
        preferred: &[String],
    ) -> Result<Arc<dyn EmailProvider>, ProviderError> {
        let mut candidates: Vec<String> = preferred.to_vec();
        for name in self.registered_names() {
            if !candidates.contains(&name) {
                candidates.push(name);
            }
        }

        for name in &candidates {
            match self.make_from_config(name) {
                Ok(provider) => {
                    if provider.is_available().await {
                        return Ok(provider);
                    }
                    warn!(provider = %name, "Provider not available, trying next");
                }
                Err(e) => {
                    warn!(provider = %name, error = %e, "Provider failed to build, trying next");
                }
            }
        }

        Err(ProviderError::NoProviderAvailable)
    }

    /// Readiness of every registered provider.
    pub fn statuses(&self) -> Vec<ProviderStatus> {
        self.registered_names()
            .iter()
            .filter_map(|name| self.make_from_config(name).ok())
            .map(|p| p.status())
            .collect()
    }
}

fn mismatch(provider: &'static str, got: &ProviderConfig) -> ProviderError {
    ProviderError::InvalidConfig {
        provider,
        message: format!("expected {provider} config, got {got:?}"),
    }
}
