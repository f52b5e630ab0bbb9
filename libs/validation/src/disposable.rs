//! Disposable-provider stage.
//!
//! Exact domain matches are checked before the indicator patterns so the
//! reported reason is stable for domains that would hit both.

use crate::outcome::CheckOutcome;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static DISPOSABLE_DOMAINS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "10minutemail.com",
        "anonbox.net",
        "dispostable.com",
        "fakeinbox.com",
        "getairmail.com",
        "getnada.com",
        "guerrillamail.com",
        "guerrillamail.net",
        "mailcatch.com",
        "maildrop.cc",
        "mailinator.com",
        "mailnesia.com",
        "mintemail.com",
        "mohmal.com",
        "sharklasers.com",
        "spamgourmet.com",
        "tempail.com",
        "temp-mail.org",
        "tempmail.com",
        "throwawaymail.com",
        "trashmail.com",
        "yopmail.com",
    ]
    .into_iter()
    .collect()
});

static DISPOSABLE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"temp",
        r"trash",
        r"throw",
        r"disposable",
        r"fake",
        r"^[0-9]+min",
    ]
    .into_iter()
    .map(|p| Regex::new(p).expect("disposable pattern regex"))
    .collect()
});

pub(crate) fn check_disposable(domain: &str) -> CheckOutcome {
    if DISPOSABLE_DOMAINS.contains(domain) {
        return CheckOutcome::fail("Disposable email provider");
    }

    if DISPOSABLE_PATTERNS.iter().any(|p| p.is_match(domain)) {
        return CheckOutcome::fail("Domain matches a disposable provider pattern");
    }

    CheckOutcome::pass("Not a known disposable provider")
}
