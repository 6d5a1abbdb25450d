//! Engine error taxonomy
//!
//! A closed set of error kinds shared by every component. Callers branch on
//! the variant; the uniform result envelope reports `kind()` over the wire.
//! `CONFLICT` is the only retriable class.

use thiserror::Error;

/// Errors surfaced by the engine.
///
/// # Example
/// ```
/// use spinwheel_engine::EngineError;
///
/// let err = EngineError::InsufficientFunds { required: 100, available: 40 };
/// assert_eq!(err.kind(), "INSUFFICIENT_FUNDS");
/// assert!(!err.retriable());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Input out of range or malformed
    #[error("validation failed: {0}")]
    Validation(String),

    /// Missing or invalid credential
    #[error("missing or invalid credential")]
    Authentication,

    /// Caller's role or account state does not permit the operation
    #[error("forbidden: {0}")]
    Authorization(String),

    /// Entity absent
    #[error("not found: {0}")]
    NotFound(String),

    /// Singleton violation, duplicate join, full round, or OCC collision
    #[error("conflict: {0}")]
    Conflict(String),

    /// State-machine precondition violated
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Join (or any debit) without enough balance
    #[error("insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: i64, available: i64 },

    /// Start below the configured minimum
    #[error("not enough participants: have {have}, need {need}")]
    NotEnoughParticipants { have: usize, need: usize },

    /// Any other fault; details are logged, callers see a generic failure
    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Canonical kind string for the result envelope.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Validation(_) => "VALIDATION",
            EngineError::Authentication => "AUTHENTICATION",
            EngineError::Authorization(_) => "AUTHORIZATION",
            EngineError::NotFound(_) => "NOT_FOUND",
            EngineError::Conflict(_) => "CONFLICT",
            EngineError::InvalidState(_) => "INVALID_STATE",
            EngineError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            EngineError::NotEnoughParticipants { .. } => "NOT_ENOUGH_PARTICIPANTS",
            EngineError::Internal(_) => "INTERNAL",
        }
    }

    /// Whether a caller may retry the operation with a fresh read.
    pub fn retriable(&self) -> bool {
        matches!(self, EngineError::Conflict(_))
    }
}
