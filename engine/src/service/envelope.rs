//! Uniform result envelope for the command surface

use serde::Serialize;

use crate::error::EngineError;

/// Error body carried over the wire.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub kind: &'static str,
    pub message: String,
}

/// `{success, data | error}` wrapper around every command result.
///
/// # Example
/// ```
/// use spinwheel_engine::{EngineError, Envelope};
///
/// let ok: Envelope<i64> = Ok(42).into();
/// assert!(ok.success);
///
/// let err: Envelope<i64> = Err(EngineError::NotFound("round".into())).into();
/// assert!(!err.success);
/// assert_eq!(err.error.unwrap().kind, "NOT_FOUND");
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl<T> From<Result<T, EngineError>> for Envelope<T> {
    fn from(result: Result<T, EngineError>) -> Self {
        match result {
            Ok(data) => Envelope {
                success: true,
                data: Some(data),
                error: None,
            },
            Err(err) => Envelope {
                success: false,
                data: None,
                error: Some(ErrorBody {
                    kind: err.kind(),
                    message: err.to_string(),
                }),
            },
        }
    }
}
