use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Lifecycle of a client's email, covering both validation verdicts and
/// delivery progress.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EmailStatus {
    Pending,
    Valid,
    Invalid,
    Queued,
    Sending,
    Sent,
    Failed,
}

/// A CRM client row, reduced to the fields the email subsystem reads and
/// writes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientRecord {
    pub id: i64,
    pub name: String,
    pub email: String,
    /// Set by the validation pipeline; delivery jobs only pick up records
    /// where this is true.
    pub is_email_valid: bool,
    pub email_status: EmailStatus,
    /// Reason string from the most recent validation verdict.
    pub email_validation_reason: Option<String>,
    /// Per-stage validation results as persisted JSON.
    pub email_validation_details: Option<serde_json::Value>,
    pub email_last_validated_at: Option<DateTime<Utc>>,
    /// Provider currently assigned for delivery, e.g. `"sendgrid"`.
    pub email_provider: Option<String>,
    pub email_sent_at: Option<DateTime<Utc>>,
    /// Number of validation passes applied to this record.
    pub email_validation_attempts: u32,
}

impl ClientRecord {
    pub fn new(id: i64, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            email: email.into(),
            is_email_valid: false,
            email_status: EmailStatus::Pending,
            email_validation_reason: None,
            email_validation_details: None,
            email_last_validated_at: None,
            email_provider: None,
            email_sent_at: None,
            email_validation_attempts: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_status_round_trips_as_snake_case() {
        assert_eq!(EmailStatus::Sending.to_string(), "sending");
        assert_eq!(EmailStatus::from_str("failed").unwrap(), EmailStatus::Failed);
        assert_eq!(
            serde_json::to_value(EmailStatus::Valid).unwrap(),
            serde_json::json!("valid")
        );
    }

    #[test]
    fn test_new_record_defaults() {
        let record = ClientRecord::new(1, "Acme", "ops@acme.com");
        assert!(!record.is_email_valid);
        assert_eq!(record.email_status, EmailStatus::Pending);
        assert!(record.email_provider.is_none());
        assert_eq!(record.email_validation_attempts, 0);
    }
}
