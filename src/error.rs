use crate::audit::request::ValidationError;
use crate::data::types::HourRange;
use serde::Serialize;
use std::time::Duration;

pub type AuditResult<T> = std::result::Result<T, AuditError>;

#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("Invalid request: {0}")]
    Validation(#[from] ValidationError),

    #[error("{provider} has no data for {missing}")]
    DataUnavailable { provider: String, missing: HourRange },

    #[error("{provider} failed: {message}")]
    ProviderFailure { provider: String, message: String },

    #[error("{provider} did not answer within {timeout:?}")]
    UpstreamTimeout { provider: String, timeout: Duration },

    #[error("Resource and price series are not aligned: {0}")]
    SeriesMismatch(String),

    #[error("Model invariant violated: {0}")]
    Computation(String),

    #[error("Audit cancelled while waiting for provider data")]
    Cancelled,
}

/// What the caller should do about a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Fix the input
    Validation,
    /// Try again later
    Data,
    /// Report a bug
    Internal,
}

impl AuditError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            AuditError::Validation(_) => ErrorCategory::Validation,
            AuditError::DataUnavailable { .. }
            | AuditError::ProviderFailure { .. }
            | AuditError::UpstreamTimeout { .. }
            | AuditError::Cancelled => ErrorCategory::Data,
            AuditError::SeriesMismatch(_) | AuditError::Computation(_) => ErrorCategory::Internal,
        }
    }

    /// Transient provider failures are worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AuditError::DataUnavailable { .. }
                | AuditError::ProviderFailure { .. }
                | AuditError::UpstreamTimeout { .. }
        )
    }
}
