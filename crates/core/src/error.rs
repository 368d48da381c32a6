//! Domain error model.

use thiserror::Error;

/// Result type used across the portal.
pub type DomainResult<T> = Result<T, DomainError>;

/// Portal-wide error taxonomy.
///
/// Components never recover these locally; each is surfaced verbatim to the
/// caller with enough context (entity, field, condition) to act on.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Malformed or missing required input. Never retried automatically.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A referenced entity is absent.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Uniqueness or concurrent-write collision. Safe to retry after re-reading state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Operation not permitted in the current lifecycle state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Storage/transport failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(entity: &'static str, id: impl core::fmt::Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Stable machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::Validation(_) => "DP-422",
            DomainError::NotFound { .. } => "DP-404",
            DomainError::Conflict(_) => "DP-409",
            DomainError::InvalidState(_) => "DP-412",
            DomainError::Internal(_) => "DP-500",
        }
    }

    /// Snake-case name of the variant, used in API payloads and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            DomainError::Validation(_) => "validation_error",
            DomainError::NotFound { .. } => "not_found",
            DomainError::Conflict(_) => "conflict",
            DomainError::InvalidState(_) => "invalid_state",
            DomainError::Internal(_) => "internal_error",
        }
    }

    /// Whether a caller may retry the same request without an out-of-band change.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DomainError::Conflict(_) | DomainError::Internal(_))
    }
}
