use serde::Serialize;
use uuid::Uuid;

/// Unified error type for every engine operation.
///
/// Collaborators surface the user-facing variants as form/validation
/// feedback and treat the rest as faults. `LineageViolation` means the
/// source batch's bookkeeping is already inconsistent and should be
/// surfaced prominently rather than swallowed.
#[derive(Debug, thiserror::Error, Serialize)]
pub enum EngineError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Insufficient inventory: requested {requested}, available {available}")]
    InsufficientInventory { requested: i32, available: i32 },

    #[error("Lineage violation: {0}")]
    LineageViolation(String),

    #[error("Concurrent modification on batch {0}")]
    ConcurrencyConflict(Uuid),

    #[error("Event error: {0}")]
    EventError(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Other error: {0}")]
    Other(
        #[from]
        #[serde(skip)]
        anyhow::Error,
    ),
}

impl From<validator::ValidationErrors> for EngineError {
    fn from(err: validator::ValidationErrors) -> Self {
        EngineError::ValidationError(err.to_string())
    }
}

impl EngineError {
    /// Expected outcomes that callers present back to the user rather than
    /// treat as a crash.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_)
                | Self::ValidationError(_)
                | Self::InvalidInput(_)
                | Self::InsufficientInventory { .. }
        )
    }

    /// Transient failures the caller may retry as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict(_))
    }

    /// Data-integrity failures: the stored counts were already wrong before
    /// this operation ran.
    pub fn is_integrity_failure(&self) -> bool {
        matches!(self, Self::LineageViolation(_))
    }
}
