//! Scoptics API crate - axum HTTP server and route handlers.
//!
//! Exposes the query agent over `/agent/query`, direct store fetches over
//! `/query/structured`, the match catalog and a health check.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::AppState;
