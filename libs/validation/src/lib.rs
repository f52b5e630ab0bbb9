//! Email validation pipeline
//!
//! Runs an email address through a fixed sequence of checks and returns a
//! structured verdict with per-stage detail:
//!
//! 1. **Format**: length limits, `@` placement, basic syntax
//! 2. **Pattern denylist**: test/no-reply/example addresses, reserved TLDs
//! 3. **Domain**: hostname shape, then MX/A lookups (fail-open on resolver
//!    errors)
//! 4. **Disposable**: known throwaway-inbox domains and indicator patterns
//!
//! The pipeline short-circuits on the first failing stage and never returns
//! an error: malformed input is an ordinary "invalid" verdict.
//!
//! ```ignore
//! use email_validation::EmailValidationService;
//!
//! let service = EmailValidationService::with_system_resolver();
//! let result = service.validate_email("user@example.com").await;
//! assert!(!result.is_valid); // example.com is a test domain
//! ```

mod disposable;
mod domain;
mod format;
pub mod outcome;
mod patterns;
pub mod resolver;
mod service;

pub use outcome::{
    BatchResult, BatchSummary, CheckOutcome, CheckStage, EmailCheckResult, StageResult,
    ValidationStats,
};
pub use resolver::{DnsError, DnsResolver, StaticResolver, SystemResolver};
pub use service::EmailValidationService;
