//! Router setup with all API routes and middleware.

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use scoptics_core::config::ScopticsConfig;
use scoptics_core::error::ScopticsError;

use crate::handlers;
use crate::state::AppState;

/// Create the axum Router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    // Browser front ends are served from other origins.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/matches", get(handlers::matches))
        .route("/agent/query", post(handlers::agent_query))
        .route("/query/structured", post(handlers::structured_query))
        .layer(DefaultBodyLimit::max(1024 * 1024)) // 1MB, chat history included
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server on the configured address.
pub async fn start_server(config: &ScopticsConfig, state: AppState) -> Result<(), ScopticsError> {
    let addr = format!("{}:{}", config.general.bind_addr, config.general.port);

    let router = create_router(state);

    tracing::info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| ScopticsError::Api(format!("Failed to bind {}: {}", addr, e)))?;

    axum::serve(listener, router)
        .await
        .map_err(|e| ScopticsError::Api(format!("Server error: {}", e)))?;

    Ok(())
}
