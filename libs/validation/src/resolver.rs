//! DNS resolution seam for the domain stage.
//!
//! `Ok(true)` / `Ok(false)` are authoritative answers; `Err` means the
//! lookup itself failed (timeout, no network), which the domain stage
//! treats as inconclusive and fails open.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use thiserror::Error;
use trust_dns_resolver::config::{ResolverConfig, ResolverOpts};
use trust_dns_resolver::error::ResolveErrorKind;
use trust_dns_resolver::TokioAsyncResolver;

/// DNS lookup infrastructure failure.
#[derive(Debug, Error)]
#[error("DNS lookup failed: {0}")]
pub struct DnsError(pub String);

#[async_trait]
pub trait DnsResolver: Send + Sync {
    /// Whether the domain has at least one MX record.
    async fn has_mx(&self, domain: &str) -> Result<bool, DnsError>;

    /// Whether the domain resolves to at least one address record.
    async fn has_a(&self, domain: &str) -> Result<bool, DnsError>;
}

/// Resolver backed by trust-dns with short timeouts, so a slow nameserver
/// cannot stall a validation chunk.
pub struct SystemResolver {
    inner: TokioAsyncResolver,
}

impl SystemResolver {
    pub fn new() -> Self {
        let mut opts = ResolverOpts::default();
        opts.timeout = Duration::from_secs(5);
        opts.attempts = 2;

        Self {
            inner: TokioAsyncResolver::tokio(ResolverConfig::default(), opts),
        }
    }
}

impl Default for SystemResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DnsResolver for SystemResolver {
    async fn has_mx(&self, domain: &str) -> Result<bool, DnsError> {
        match self.inner.mx_lookup(domain).await {
            Ok(lookup) => Ok(lookup.iter().next().is_some()),
            Err(e) => match e.kind() {
                ResolveErrorKind::NoRecordsFound { .. } => Ok(false),
                _ => Err(DnsError(e.to_string())),
            },
        }
    }

    async fn has_a(&self, domain: &str) -> Result<bool, DnsError> {
        match self.inner.lookup_ip(domain).await {
            Ok(lookup) => Ok(lookup.iter().next().is_some()),
            Err(e) => match e.kind() {
                ResolveErrorKind::NoRecordsFound { .. } => Ok(false),
                _ => Err(DnsError(e.to_string())),
            },
        }
    }
}

/// Fixed-answer resolver for tests.
#[derive(Debug, Default)]
pub struct StaticResolver {
    records: HashMap<String, (bool, bool)>,
    failing: HashSet<String>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a domain with the given MX / address-record presence.
    pub fn with_domain(mut self, domain: &str, has_mx: bool, has_a: bool) -> Self {
        self.records.insert(domain.to_string(), (has_mx, has_a));
        self
    }

    /// Register a domain whose lookups fail (simulated resolver outage).
    pub fn with_failing_domain(mut self, domain: &str) -> Self {
        self.failing.insert(domain.to_string());
        self
    }

    fn lookup(&self, domain: &str) -> Result<(bool, bool), DnsError> {
        if self.failing.contains(domain) {
            return Err(DnsError(format!("simulated outage for {domain}")));
        }
        Ok(self.records.get(domain).copied().unwrap_or((false, false)))
    }
}

#[async_trait]
impl DnsResolver for StaticResolver {
    async fn has_mx(&self, domain: &str) -> Result<bool, DnsError> {
        self.lookup(domain).map(|(mx, _)| mx)
    }

    async fn has_a(&self, domain: &str) -> Result<bool, DnsError> {
        self.lookup(domain).map(|(_, a)| a)
    }
}
