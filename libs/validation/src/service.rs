//! Pipeline entry points.

use crate::disposable;
use crate::domain;
use crate::format;
use crate::outcome::{
    BatchResult, BatchSummary, CheckStage, EmailCheckResult, StageResult, ValidationStats,
};
use crate::patterns;
use crate::resolver::{DnsResolver, SystemResolver};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Runs emails through the validation pipeline.
///
/// `validate_email` is side-effect-free and never fails: every input,
/// however malformed, produces a verdict. Internal lookup errors are
/// absorbed by the fail-open policy of the domain stage.
pub struct EmailValidationService {
    resolver: Arc<dyn DnsResolver>,
}

impl EmailValidationService {
    pub fn new(resolver: Arc<dyn DnsResolver>) -> Self {
        Self { resolver }
    }

    /// Service backed by the system DNS configuration.
    pub fn with_system_resolver() -> Self {
        Self::new(Arc::new(SystemResolver::new()))
    }

    /// Validate a single address, short-circuiting on the first failing
    /// stage.
    pub async fn validate_email(&self, raw: &str) -> EmailCheckResult {
        let normalized = raw.trim().to_lowercase();
        let mut checks = Vec::with_capacity(4);

        let outcome = format::check_format(&normalized);
        let failed = !outcome.valid;
        let reason = outcome.reason.clone();
        checks.push(StageResult {
            stage: CheckStage::Format,
            outcome,
        });
        if failed {
            return EmailCheckResult::failed(normalized, reason, checks);
        }

        let outcome = patterns::check_patterns(&normalized);
        let failed = !outcome.valid;
        let reason = outcome.reason.clone();
        checks.push(StageResult {
            stage: CheckStage::Pattern,
            outcome,
        });
        if failed {
            return EmailCheckResult::failed(normalized, reason, checks);
        }

        let domain = domain::domain_part(&normalized);

        let outcome = domain::check_domain(domain, self.resolver.as_ref()).await;
        let failed = !outcome.valid;
        let reason = outcome.reason.clone();
        checks.push(StageResult {
            stage: CheckStage::Domain,
            outcome,
        });
        if failed {
            return EmailCheckResult::failed(normalized, reason, checks);
        }

        let outcome = disposable::check_disposable(domain);
        let failed = !outcome.valid;
        let reason = outcome.reason.clone();
        checks.push(StageResult {
            stage: CheckStage::Disposable,
            outcome,
        });
        if failed {
            return EmailCheckResult::failed(normalized, reason, checks);
        }

        debug!(email = %normalized, "Email passed all validation checks");
        EmailCheckResult::passed(normalized, checks)
    }

    /// Validate a sequence of addresses and tally the verdicts.
    pub async fn validate_batch<S: AsRef<str>>(&self, emails: &[S]) -> BatchResult {
        let mut results = Vec::with_capacity(emails.len());
        for email in emails {
            results.push(self.validate_email(email.as_ref()).await);
        }

        let valid = results.iter().filter(|r| r.is_valid).count();
        let stats = BatchSummary {
            total: results.len(),
            valid,
            invalid: results.len() - valid,
        };

        BatchResult { results, stats }
    }

    /// Aggregate statistics over a set of results, grouping failures by
    /// reason.
    pub fn validation_stats(results: &[EmailCheckResult]) -> ValidationStats {
        let mut reasons: HashMap<String, usize> = HashMap::new();
        let mut valid = 0;

        for result in results {
            if result.is_valid {
                valid += 1;
            } else {
                *reasons.entry(result.reason.clone()).or_insert(0) += 1;
            }
        }

        ValidationStats {
            total: results.len(),
            valid,
            invalid: results.len() - valid,
            reasons,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::StaticResolver;

    fn service() -> EmailValidationService {
        let resolver = StaticResolver::new()
            .with_domain("gmail.com", true, true)
            .with_domain("realdomain.com", true, false)
            .with_domain("mailinator.com", true, true)
            .with_domain("deadmail.com", false, false)
            .with_failing_domain("flaky.com");
        EmailValidationService::new(Arc::new(resolver))
    }

    #[tokio::test]
    async fn test_valid_email() {
        let result = service().validate_email("user@realdomain.com").await;
        assert!(result.is_valid);
        assert_eq!(result.reason, "All validation checks passed");
        assert_eq!(result.checks.len(), 4);
    }

    #[tokio::test]
    async fn test_normalization() {
        let result = service().validate_email("  User@RealDomain.COM ").await;
        assert_eq!(result.normalized_email, "user@realdomain.com");
        assert!(result.is_valid);
    }

    #[tokio::test]
    async fn test_test_domain_short_circuits_before_dns() {
        // example.com is not in the static resolver: if the domain stage
        // ran, it would reject for missing records with a different reason.
        let result = service().validate_email("test@example.com").await;
        assert!(!result.is_valid);
        assert_eq!(result.reason, "Test domain email");
        assert_eq!(result.checks.len(), 2);
        assert!(result.stage(CheckStage::Domain).is_none());
    }

    #[tokio::test]
    async fn test_disposable_domain() {
        let result = service().validate_email("user@mailinator.com").await;
        assert!(!result.is_valid);
        assert!(result.reason.to_lowercase().contains("disposable"));
    }

    #[tokio::test]
    async fn test_multiple_at_symbols_reason() {
        let result = service().validate_email("a@b@c.com").await;
        assert!(!result.is_valid);
        assert_eq!(result.reason, "Email must contain exactly one @ symbol");
    }

    #[tokio::test]
    async fn test_long_local_part_reason() {
        let email = format!("{}@gmail.com", "a".repeat(65));
        let result = service().validate_email(&email).await;
        assert!(!result.is_valid);
        assert_eq!(result.reason, "Local or domain part exceeds maximum length");
    }

    #[tokio::test]
    async fn test_dead_domain_rejected() {
        let result = service().validate_email("user@deadmail.com").await;
        assert!(!result.is_valid);
        assert_eq!(result.reason, "Domain has no MX or A records");
    }

    #[tokio::test]
    async fn test_resolver_outage_fails_open() {
        let result = service().validate_email("user@flaky.com").await;
        assert!(result.is_valid);
        let domain = result.stage(CheckStage::Domain).unwrap();
        assert!(domain.reason.contains("skipped"));
    }

    #[tokio::test]
    async fn test_deterministic() {
        let service = service();
        let a = service.validate_email("user@realdomain.com").await;
        let b = service.validate_email("user@realdomain.com").await;
        assert_eq!(
            serde_json::to_value(&a).unwrap(),
            serde_json::to_value(&b).unwrap()
        );
    }

    #[tokio::test]
    async fn test_batch_stats() {
        let service = service();
        let batch = service
            .validate_batch(&["user@realdomain.com", "test@example.com", "bad"])
            .await;

        assert_eq!(batch.stats, BatchSummary { total: 3, valid: 1, invalid: 2 });
    }

    #[tokio::test]
    async fn test_validation_stats_groups_reasons() {
        let service = service();
        let batch = service
            .validate_batch(&[
                "user@realdomain.com",
                "test@example.org",
                "demo@example.net",
                "a@b@c.com",
            ])
            .await;

        let stats = EmailValidationService::validation_stats(&batch.results);
        assert_eq!(stats.total, 4);
        assert_eq!(stats.valid, 1);
        assert_eq!(stats.invalid, 3);
        assert_eq!(stats.reasons["Test domain email"], 2);
        assert_eq!(stats.reasons["Email must contain exactly one @ symbol"], 1);
    }
}
