//! Verdict types produced by the validation pipeline.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strum::{AsRefStr, Display};

/// A pipeline stage, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CheckStage {
    Format,
    Pattern,
    Domain,
    Disposable,
}

/// Outcome of a single pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckOutcome {
    pub valid: bool,
    pub reason: String,
    /// Stage-specific detail (e.g. `has_mx`/`has_a` for the domain stage).
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub details: serde_json::Value,
}

impl CheckOutcome {
    pub fn pass(reason: impl Into<String>) -> Self {
        Self {
            valid: true,
            reason: reason.into(),
            details: serde_json::Value::Null,
        }
    }

    pub fn fail(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            reason: reason.into(),
            details: serde_json::Value::Null,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }
}

/// A stage paired with its outcome. Kept in a `Vec` to preserve execution
/// order in the serialized form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageResult {
    pub stage: CheckStage,
    #[serde(flatten)]
    pub outcome: CheckOutcome,
}

/// Terminal verdict for one input string.
///
/// `checks` only contains stages that actually ran: the pipeline
/// short-circuits on the first failing stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailCheckResult {
    /// Lowercased, trimmed input.
    pub normalized_email: String,
    pub is_valid: bool,
    /// Reason of the first failing stage, or the all-passed message.
    pub reason: String,
    pub checks: Vec<StageResult>,
}

impl EmailCheckResult {
    pub fn passed(normalized_email: String, checks: Vec<StageResult>) -> Self {
        Self {
            normalized_email,
            is_valid: true,
            reason: "All validation checks passed".to_string(),
            checks,
        }
    }

    pub fn failed(
        normalized_email: String,
        reason: String,
        checks: Vec<StageResult>,
    ) -> Self {
        Self {
            normalized_email,
            is_valid: false,
            reason,
            checks,
        }
    }

    /// Look up the outcome of a specific stage, if it ran.
    pub fn stage(&self, stage: CheckStage) -> Option<&CheckOutcome> {
        self.checks
            .iter()
            .find(|s| s.stage == stage)
            .map(|s| &s.outcome)
    }
}

/// Tally for a batch validation run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub valid: usize,
    pub invalid: usize,
}

/// Results plus tally for a batch validation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResult {
    pub results: Vec<EmailCheckResult>,
    pub stats: BatchSummary,
}

/// Aggregated statistics over a set of results, for reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationStats {
    pub total: usize,
    pub valid: usize,
    pub invalid: usize,
    /// Failure reason → occurrence count.
    pub reasons: HashMap<String, usize>,
}
