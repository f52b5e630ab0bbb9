use std::time::Duration;
use thiserror::Error;

/// Whether a failed job is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Retry with backoff until attempts run out.
    Transient,
    /// Never retry; goes straight to the permanent failure hook.
    Permanent,
}

#[derive(Error, Debug)]
pub enum JobError {
    #[error("Queue error: {0}")]
    Queue(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Processing error: {message}")]
    Processing {
        message: String,
        category: ErrorCategory,
    },

    #[error("Job timed out after {0:?}")]
    Timeout(Duration),
}

impl JobError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Processing {
            message: message.into(),
            category: ErrorCategory::Transient,
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self::Processing {
            message: message.into(),
            category: ErrorCategory::Permanent,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            JobError::Processing { category, .. } => *category,
            JobError::Queue(_) | JobError::Serialization(_) | JobError::Timeout(_) => {
                ErrorCategory::Transient
            }
        }
    }
}

impl From<redis::RedisError> for JobError {
    fn from(e: redis::RedisError) -> Self {
        JobError::Queue(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        assert_eq!(JobError::transient("x").category(), ErrorCategory::Transient);
        assert_eq!(JobError::permanent("x").category(), ErrorCategory::Permanent);
        assert_eq!(
            JobError::Timeout(Duration::from_secs(1)).category(),
            ErrorCategory::Transient
        );
        assert_eq!(
            JobError::Queue("down".into()).category(),
            ErrorCategory::Transient
        );
    }
}
