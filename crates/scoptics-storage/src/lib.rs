//! Scoptics Storage crate - read-only SQLite access to match data.
//!
//! Provides a read-only database wrapper with a statement guard, the
//! `DataStore` trait the agent fetches through, and its SQLite
//! implementation over the tracking, events and match_metadata tables.

pub mod db;
pub mod error;
pub mod filters;
pub mod fixture;
pub mod guard;
pub mod store;

pub use db::Database;
pub use error::{StoreError, StoreErrorKind};
pub use filters::{Fetched, QueryFilters, TrackingOrder, Window};
pub use store::{DataStore, Record, SqliteStore, DEFAULT_MAX_ROWS};
