//! API error types and JSON error response formatting.
//!
//! Every non-2xx response has the body `{ "detail": "..." }`. Internal
//! failures are logged and replaced with a generic message. A failed agent
//! turn also carries `updated_history`, the conversation with that turn
//! recorded.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use scoptics_agent::{AgentError, AgentFailure, ConversationState};
use scoptics_storage::{StoreError, StoreErrorKind};

/// JSON error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_history: Option<ConversationState>,
}

/// API error type that maps to HTTP status codes and JSON responses.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// 400 - missing, malformed or invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// 403 - the store refused the operation.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// 500 - unexpected server error. The message is not sent to clients.
    #[error("internal error: {0}")]
    Internal(String),
    /// 502 - the language model behind the classifier failed.
    #[error("bad gateway: {0}")]
    BadGateway(String),
    /// 503 - the store is unavailable.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    /// 504 - the store did not answer in time.
    #[error("gateway timeout: {0}")]
    GatewayTimeout(String),
    /// A failed agent turn; responds as `error` with the history attached.
    #[error("{error}")]
    Turn {
        error: Box<ApiError>,
        history: ConversationState,
    },
}

impl ApiError {
    fn status_and_detail(self) -> (StatusCode, String) {
        match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                )
            }
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
            ApiError::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            ApiError::GatewayTimeout(msg) => (StatusCode::GATEWAY_TIMEOUT, msg),
            ApiError::Turn { error, .. } => error.status_and_detail(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (updated_history, error) = match self {
            ApiError::Turn { error, history } => (Some(history), *error),
            other => (None, other),
        };
        let (status, detail) = error.status_and_detail();

        (
            status,
            Json(ErrorBody {
                detail,
                updated_history,
            }),
        )
            .into_response()
    }
}

impl From<AgentFailure> for ApiError {
    fn from(failure: AgentFailure) -> Self {
        ApiError::Turn {
            error: Box::new(failure.error.into()),
            history: failure.updated_history,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        let msg = err.to_string();
        match err.kind() {
            StoreErrorKind::InvalidFilter => ApiError::BadRequest(msg),
            StoreErrorKind::PermissionDenied => ApiError::Forbidden(msg),
            StoreErrorKind::Timeout => ApiError::GatewayTimeout(msg),
            StoreErrorKind::Unavailable => ApiError::ServiceUnavailable(msg),
            StoreErrorKind::Malformed => ApiError::Internal(msg),
        }
    }
}

impl From<AgentError> for ApiError {
    fn from(err: AgentError) -> Self {
        let msg = err.to_string();
        match err {
            AgentError::EmptyQuery | AgentError::QueryTooLong(_) | AgentError::AmbiguousMatch => {
                ApiError::BadRequest(msg)
            }
            AgentError::PermissionDenied(_) => ApiError::Forbidden(msg),
            AgentError::RetrievalFailed { kind, .. } => match kind {
                StoreErrorKind::InvalidFilter => ApiError::BadRequest(msg),
                StoreErrorKind::PermissionDenied => ApiError::Forbidden(msg),
                StoreErrorKind::Timeout => ApiError::GatewayTimeout(msg),
                StoreErrorKind::Unavailable => ApiError::ServiceUnavailable(msg),
                StoreErrorKind::Malformed => ApiError::Internal(msg),
            },
            AgentError::Classifier(_) => ApiError::BadGateway(msg),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}
