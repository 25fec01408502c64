//! Error types for the query agent.

use scoptics_core::error::ScopticsError;
use scoptics_storage::{StoreError, StoreErrorKind};

/// Errors from agent orchestration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AgentError {
    #[error("Query cannot be empty.")]
    EmptyQuery,
    #[error("Query exceeds maximum length of {0} characters.")]
    QueryTooLong(usize),
    #[error("could not determine which match the query refers to")]
    AmbiguousMatch,
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("retrieval failed ({kind}): {message}")]
    RetrievalFailed {
        kind: StoreErrorKind,
        message: String,
    },
    #[error("classifier error: {0}")]
    Classifier(String),
}

impl AgentError {
    /// Whether the failure must reach the caller as an error instead of a reply.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AgentError::PermissionDenied(_)
                | AgentError::RetrievalFailed {
                    kind: StoreErrorKind::PermissionDenied,
                    ..
                }
        )
    }
}

impl From<StoreError> for AgentError {
    fn from(err: StoreError) -> Self {
        AgentError::RetrievalFailed {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl From<AgentError> for ScopticsError {
    fn from(err: AgentError) -> Self {
        ScopticsError::Agent(err.to_string())
    }
}
