//! Pattern denylist stage.
//!
//! Rejects addresses matching a fixed, ordered list of patterns. The list
//! order is the priority order: the first matching pattern supplies the
//! reason, so verdicts stay deterministic when several patterns would match.

use crate::outcome::CheckOutcome;
use once_cell::sync::Lazy;
use regex::Regex;

static DENYLIST: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"@example\.(com|org|net)$", "Test domain email"),
        (r"^(test|testing|tester)[0-9._-]*@", "Test email address"),
        (r"^(no-?reply|do-?not-?reply|donotreply)@", "No-reply address"),
        (r"\.(local|invalid|test|localhost)$", "Reserved or invalid TLD"),
        (r"^[0-9]+@", "Numeric-only local part"),
        (
            r"@[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}$",
            "IP address used as domain",
        ),
    ]
    .into_iter()
    .map(|(pattern, reason)| (Regex::new(pattern).expect("denylist regex"), reason))
    .collect()
});

pub(crate) fn check_patterns(email: &str) -> CheckOutcome {
    for (pattern, reason) in DENYLIST.iter() {
        if pattern.is_match(email) {
            return CheckOutcome::fail(*reason);
        }
    }
    CheckOutcome::pass("No denylist pattern matched")
}
