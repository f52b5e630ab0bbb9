//! Format stage: structural checks that need no network access.

use crate::outcome::CheckOutcome;
use once_cell::sync::Lazy;
use regex::Regex;

/// RFC 5321 limit on the full address.
const MAX_EMAIL_LEN: usize = 254;
/// RFC 5321 limit on the local part.
const MAX_LOCAL_LEN: usize = 64;
/// RFC 1035 limit on the domain.
const MAX_DOMAIN_LEN: usize = 253;

static SYNTAX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-z0-9-]+(\.[a-z0-9-]+)*$")
        .expect("email syntax regex")
});

/// Check structural validity of a normalized (trimmed, lowercased) address.
///
/// The `@`-count check runs before the syntax check so that multi-`@` inputs
/// always report the `@`-specific reason.
pub(crate) fn check_format(email: &str) -> CheckOutcome {
    if email.is_empty() {
        return CheckOutcome::fail("Email is empty");
    }

    if email.len() > MAX_EMAIL_LEN {
        return CheckOutcome::fail("Email exceeds maximum length of 254 characters");
    }

    let at_count = email.matches('@').count();
    if at_count != 1 {
        return CheckOutcome::fail("Email must contain exactly one @ symbol");
    }

    let (local, domain) = email.split_once('@').unwrap_or((email, ""));
    if local.len() > MAX_LOCAL_LEN || domain.len() > MAX_DOMAIN_LEN {
        return CheckOutcome::fail("Local or domain part exceeds maximum length");
    }

    if !SYNTAX.is_match(email) {
        return CheckOutcome::fail("Invalid email format");
    }

    CheckOutcome::pass("Format is valid")
}
