//! Database connection management.
//!
//! Wraps a single read-only rusqlite Connection in a Mutex. Every
//! connection handed to [`Database`] has `query_only` switched on, and
//! every statement goes through the statement guard first.

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use rusqlite::{Connection, OpenFlags, Row, ToSql};
use tracing::{debug, info};

use crate::error::StoreError;
use crate::guard;

/// Thread-safe, read-only SQLite database wrapper.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open an existing database file read-only.
    ///
    /// Fails with `Unavailable` if the file does not exist; the store is
    /// populated by ingestion and never created here.
    pub fn open_read_only(path: &Path, busy_timeout: Duration) -> Result<Self, StoreError> {
        if !path.exists() {
            return Err(StoreError::Unavailable(format!(
                "database not found at {}",
                path.display()
            )));
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| StoreError::Unavailable(format!("Failed to open database: {}", e)))?;

        conn.busy_timeout(busy_timeout)
            .map_err(|e| StoreError::Unavailable(format!("Failed to set busy timeout: {}", e)))?;

        let db = Self::from_connection(conn)?;
        info!("Database opened read-only at {}", path.display());
        Ok(db)
    }

    /// Seal an already-open connection (e.g. a seeded in-memory fixture).
    ///
    /// Switches the connection to `query_only`; writes fail from here on.
    pub fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA query_only = ON;")
            .map_err(|e| StoreError::Unavailable(format!("Failed to set pragmas: {}", e)))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Execute a closure with a reference to the underlying connection.
    ///
    /// The mutex is held for the duration of the closure and released on
    /// every exit path.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| StoreError::Unavailable(format!("Database lock poisoned: {}", e)))?;
        f(&conn)
    }

    /// Run a guarded read and map every row.
    pub fn query<T, F>(&self, sql: &str, params: &[&dyn ToSql], map: F) -> Result<Vec<T>, StoreError>
    where
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        guard::ensure_read_only(sql)?;
        debug!(params = params.len(), "Running guarded query");

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(sql)?;
            let rows = stmt.query_map(params, map)?;
            let collected = rows.collect::<rusqlite::Result<Vec<T>>>();
            collected.map_err(StoreError::from)
        })
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture;

    fn seeded() -> Database {
        let conn = Connection::open_in_memory().unwrap();
        fixture::create_schema(&conn).unwrap();
        fixture::insert_match(&conn, &fixture::sample_match("match_1")).unwrap();
        Database::from_connection(conn).unwrap()
    }

    #[test]
    fn test_query_reads_rows() {
        let db = seeded();
        let ids = db
            .query("SELECT match_id FROM match_metadata", &[], |row| {
                row.get::<_, String>(0)
            })
            .unwrap();
        assert_eq!(ids, vec!["match_1".to_string()]);
    }

    #[test]
    fn test_query_rejects_write_before_sqlite() {
        let db = seeded();
        let err = db
            .query("DELETE FROM match_metadata", &[], |row| row.get::<_, i64>(0))
            .unwrap_err();
        assert!(matches!(err, StoreError::PermissionDenied(_)));
    }

    #[test]
    fn test_query_only_blocks_raw_writes() {
        let db = seeded();
        let err = db
            .with_conn(|conn| {
                conn.execute("DELETE FROM match_metadata", [])?;
                Ok(())
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::PermissionDenied(_)));

        let count = db
            .query("SELECT COUNT(*) FROM match_metadata", &[], |row| {
                row.get::<_, i64>(0)
            })
            .unwrap();
        assert_eq!(count, vec![1]);
    }

    #[test]
    fn test_open_missing_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let err = Database::open_read_only(&dir.path().join("nope.db"), Duration::from_millis(100))
            .unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }

    #[test]
    fn test_open_file_read_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("matches.db");
        {
            let conn = Connection::open(&path).unwrap();
            fixture::create_schema(&conn).unwrap();
            fixture::insert_match(&conn, &fixture::sample_match("match_9")).unwrap();
        }

        let db = Database::open_read_only(&path, Duration::from_millis(100)).unwrap();
        let err = db
            .with_conn(|conn| {
                conn.execute("DELETE FROM match_metadata", [])?;
                Ok(())
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::PermissionDenied(_)));
    }
}
