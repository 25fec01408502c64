//! Statement guard for the read-only store.
//!
//! Every statement issued through [`Database::query`](crate::Database::query)
//! passes through [`ensure_read_only`] before it is prepared. The connection
//! itself is also opened read-only; the guard rejects writes before they
//! reach SQLite at all.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::StoreError;

/// Leading keyword of an accepted statement.
static READ_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)^\s*(select|with)\b").unwrap());

/// Keywords that never belong in a read.
static WRITE_KEYWORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(insert|update|delete|drop|alter|create|attach|detach|pragma|vacuum|reindex|savepoint|release|begin|commit|rollback)\b",
    )
    .unwrap()
});

/// Tables, schema qualifiers and catalog names a tracking query may not touch.
static FOREIGN_NAMES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:events|match_metadata|sqlite_\w+)\b|\b(?:main|temp)\s*\.").unwrap()
});

/// Reject anything that is not a single `SELECT` or `WITH` query.
pub fn ensure_read_only(sql: &str) -> Result<(), StoreError> {
    let body = sql.trim().trim_end_matches(';').trim_end();

    if body.is_empty() {
        return Err(StoreError::PermissionDenied("empty statement".to_string()));
    }
    if body.contains(';') {
        return Err(StoreError::PermissionDenied(
            "multiple statements are not allowed".to_string(),
        ));
    }
    if !READ_PREFIX.is_match(body) {
        return Err(StoreError::PermissionDenied(
            "only SELECT queries are allowed".to_string(),
        ));
    }
    if let Some(m) = WRITE_KEYWORDS.find(body) {
        return Err(StoreError::PermissionDenied(format!(
            "statement contains forbidden keyword '{}'",
            m.as_str().to_uppercase()
        )));
    }
    Ok(())
}

/// Check a caller-written query that may read the `tracking` table only.
///
/// Returns the statement without its trailing semicolon, ready to be
/// wrapped as a subquery. Writes are `PermissionDenied`; reading another
/// table or using bound parameters is `InvalidFilter`.
pub fn ensure_tracking_only(sql: &str) -> Result<&str, StoreError> {
    ensure_read_only(sql)?;
    let body = sql.trim().trim_end_matches(';').trim_end();
    if let Some(m) = FOREIGN_NAMES.find(body) {
        return Err(StoreError::InvalidFilter(format!(
            "dynamic queries may only read the tracking table, found '{}'",
            m.as_str()
        )));
    }
    if body.contains('?') {
        return Err(StoreError::InvalidFilter(
            "dynamic queries cannot take parameters".to_string(),
        ));
    }
    Ok(body)
}
