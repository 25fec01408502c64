//! Data store error kinds.

use rusqlite::ErrorCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use scoptics_core::error::ScopticsError;

/// Failure of a data store operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Caller-supplied filters are invalid (empty match id, reversed window, ...).
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    /// A statement attempted something other than a read.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The store did not answer within the busy timeout.
    #[error("Store timed out: {0}")]
    Timeout(String),

    /// The store could not be reached or the query failed to run.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A stored row could not be decoded into a domain value.
    #[error("Malformed row: {0}")]
    Malformed(String),
}

/// Field-less discriminant of [`StoreError`], carried by retrieval failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreErrorKind {
    InvalidFilter,
    PermissionDenied,
    Timeout,
    Unavailable,
    Malformed,
}

impl std::fmt::Display for StoreErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StoreErrorKind::InvalidFilter => "invalid_filter",
            StoreErrorKind::PermissionDenied => "permission_denied",
            StoreErrorKind::Timeout => "timeout",
            StoreErrorKind::Unavailable => "unavailable",
            StoreErrorKind::Malformed => "malformed",
        };
        f.write_str(name)
    }
}

impl StoreError {
    pub fn kind(&self) -> StoreErrorKind {
        match self {
            StoreError::InvalidFilter(_) => StoreErrorKind::InvalidFilter,
            StoreError::PermissionDenied(_) => StoreErrorKind::PermissionDenied,
            StoreError::Timeout(_) => StoreErrorKind::Timeout,
            StoreError::Unavailable(_) => StoreErrorKind::Unavailable,
            StoreError::Malformed(_) => StoreErrorKind::Malformed,
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(ffi_err, _) => match ffi_err.code {
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => {
                    StoreError::Timeout(err.to_string())
                }
                ErrorCode::ReadOnly
                | ErrorCode::PermissionDenied
                | ErrorCode::AuthorizationForStatementDenied => {
                    StoreError::PermissionDenied(err.to_string())
                }
                _ => StoreError::Unavailable(err.to_string()),
            },
            rusqlite::Error::FromSqlConversionFailure(..)
            | rusqlite::Error::InvalidColumnType(..)
            | rusqlite::Error::IntegralValueOutOfRange(..) => {
                StoreError::Malformed(err.to_string())
            }
            _ => StoreError::Unavailable(err.to_string()),
        }
    }
}

impl From<StoreError> for ScopticsError {
    fn from(err: StoreError) -> Self {
        ScopticsError::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sqlite_failure(code: i32) -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(rusqlite::ffi::Error::new(code), None)
    }

    #[test]
    fn test_busy_maps_to_timeout() {
        let err: StoreError = sqlite_failure(rusqlite::ffi::SQLITE_BUSY).into();
        assert_eq!(err.kind(), StoreErrorKind::Timeout);
    }

    #[test]
    fn test_readonly_maps_to_permission_denied() {
        let err: StoreError = sqlite_failure(rusqlite::ffi::SQLITE_READONLY).into();
        assert_eq!(err.kind(), StoreErrorKind::PermissionDenied);
    }

    #[test]
    fn test_other_failures_map_to_unavailable() {
        let err: StoreError = sqlite_failure(rusqlite::ffi::SQLITE_CANTOPEN).into();
        assert_eq!(err.kind(), StoreErrorKind::Unavailable);
        let err: StoreError = rusqlite::Error::QueryReturnedNoRows.into();
        assert_eq!(err.kind(), StoreErrorKind::Unavailable);
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(StoreErrorKind::InvalidFilter.to_string(), "invalid_filter");
        assert_eq!(
            StoreError::PermissionDenied("write".into()).to_string(),
            "Permission denied: write"
        );
    }

    #[test]
    fn test_into_scoptics_error() {
        let err: ScopticsError = StoreError::Timeout("slow".into()).into();
        assert!(matches!(err, ScopticsError::Storage(_)));
    }
}
