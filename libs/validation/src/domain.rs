//! Domain stage: hostname shape checks followed by DNS lookups.

use crate::outcome::CheckOutcome;
use crate::resolver::DnsResolver;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;
use tracing::warn;

static HOSTNAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([a-z0-9-]+\.)+[a-z]{2,}$").expect("hostname regex"));

/// Domain part of an address: everything after the last `@`.
pub(crate) fn domain_part(email: &str) -> &str {
    email.rsplit_once('@').map(|(_, d)| d).unwrap_or("")
}

fn check_shape(domain: &str) -> Option<&'static str> {
    if domain.is_empty() {
        return Some("Email domain is empty");
    }
    if !HOSTNAME.is_match(domain) {
        return Some("Domain is not a valid hostname");
    }
    if domain.contains("..") || domain.contains("--") {
        return Some("Domain contains consecutive dots or hyphens");
    }
    if domain.starts_with('.')
        || domain.ends_with('.')
        || domain.starts_with('-')
        || domain.ends_with('-')
    {
        return Some("Domain starts or ends with an invalid character");
    }
    None
}

/// Run the domain stage.
///
/// A domain is rejected only when both MX and address lookups come back
/// authoritatively empty. Resolver errors fail open: transient DNS trouble
/// must not invalidate legitimate addresses.
pub(crate) async fn check_domain(domain: &str, resolver: &dyn DnsResolver) -> CheckOutcome {
    if let Some(reason) = check_shape(domain) {
        return CheckOutcome::fail(reason);
    }

    let smtp_check = json!({ "enabled": false, "reason": "disabled" });

    let (has_mx, has_a) = match resolve_records(domain, resolver).await {
        Ok(records) => records,
        Err(e) => {
            warn!(domain = %domain, error = %e, "DNS lookup failed, failing open");
            return CheckOutcome::pass("DNS check skipped: resolver error")
                .with_details(json!({ "smtp_check": smtp_check }));
        }
    };

    let details = json!({
        "has_mx": has_mx,
        "has_a": has_a,
        "smtp_check": smtp_check,
    });

    if !has_mx && !has_a {
        return CheckOutcome::fail("Domain has no MX or A records").with_details(details);
    }

    CheckOutcome::pass("Domain has mail server records").with_details(details)
}

async fn resolve_records(
    domain: &str,
    resolver: &dyn DnsResolver,
) -> Result<(bool, bool), crate::resolver::DnsError> {
    let has_mx = resolver.has_mx(domain).await?;
    let has_a = resolver.has_a(domain).await?;
    Ok((has_mx, has_a))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::StaticResolver;

    #[test]
    fn test_domain_part() {
        assert_eq!(domain_part("user@gmail.com"), "gmail.com");
        assert_eq!(domain_part("no-at-sign"), "");
    }

    #[test]
    fn test_shape_rejections() {
        assert_eq!(check_shape(""), Some("Email domain is empty"));
        assert_eq!(check_shape("nodots"), Some("Domain is not a valid hostname"));
        assert_eq!(check_shape("host.c"), Some("Domain is not a valid hostname"));
        assert_eq!(
            check_shape("bad--host.com"),
            Some("Domain contains consecutive dots or hyphens")
        );
        assert!(check_shape("mail.gmail.com").is_none());
    }

    #[tokio::test]
    async fn test_mx_only_passes() {
        let resolver = StaticResolver::new().with_domain("mx-only.com", true, false);
        let outcome = check_domain("mx-only.com", &resolver).await;
        assert!(outcome.valid);
        assert_eq!(outcome.details["has_mx"], true);
        assert_eq!(outcome.details["has_a"], false);
    }

    #[tokio::test]
    async fn test_a_only_passes() {
        let resolver = StaticResolver::new().with_domain("a-only.com", false, true);
        assert!(check_domain("a-only.com", &resolver).await.valid);
    }

    #[tokio::test]
    async fn test_no_records_rejected() {
        let resolver = StaticResolver::new();
        let outcome = check_domain("ghost.com", &resolver).await;
        assert!(!outcome.valid);
        assert_eq!(outcome.reason, "Domain has no MX or A records");
    }

    #[tokio::test]
    async fn test_resolver_error_fails_open() {
        let resolver = StaticResolver::new().with_failing_domain("flaky.com");
        let outcome = check_domain("flaky.com", &resolver).await;
        assert!(outcome.valid);
        assert!(outcome.reason.contains("skipped"));
    }

    #[tokio::test]
    async fn test_smtp_check_always_disabled() {
        let resolver = StaticResolver::new().with_domain("mx-only.com", true, false);
        let outcome = check_domain("mx-only.com", &resolver).await;
        assert_eq!(outcome.details["smtp_check"]["enabled"], false);
        assert_eq!(outcome.details["smtp_check"]["reason"], "disabled");
    }
}
