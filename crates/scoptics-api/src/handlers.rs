//! Route handler functions for all API endpoints.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use scoptics_agent::{AgentResponse, ConversationState};
use scoptics_core::types::{EntityKind, MatchMetadata};
use scoptics_storage::{Fetched, QueryFilters, StoreError};

use crate::error::ApiError;
use crate::state::AppState;

// =============================================================================
// Request / response types
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    /// Matches in the catalog snapshot.
    pub matches: usize,
    pub classifier: String,
}

/// Body of POST /agent/query.
#[derive(Debug, Deserialize)]
pub struct AgentQueryRequest {
    pub query: String,
    #[serde(default)]
    pub chat_history: ConversationState,
}

#[derive(Debug, Serialize)]
pub struct AgentQueryResponse {
    pub response: AgentResponse,
}

/// Body of POST /query/structured.
#[derive(Debug, Deserialize)]
pub struct StructuredQueryRequest {
    /// Defaults to events.
    #[serde(default)]
    pub entity: Option<EntityKind>,
    pub match_id: String,
    #[serde(default)]
    pub filters: QueryFilters,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StructuredQueryResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub data: Vec<serde_json::Value>,
    #[serde(default)]
    pub truncated: bool,
}

// =============================================================================
// Handlers
// =============================================================================

/// GET / - welcome message.
pub async fn root() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: "Welcome to the Scoptics AI Agent API".to_string(),
    })
}

/// GET /health - health check.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        matches: state.catalog.len(),
        classifier: state.orchestrator.classifier_name().to_string(),
    })
}

/// GET /matches - the match catalog.
pub async fn matches(State(state): State<AppState>) -> Json<Vec<MatchMetadata>> {
    Json(state.catalog.matches().to_vec())
}

/// POST /agent/query - one conversational turn.
pub async fn agent_query(
    State(state): State<AppState>,
    payload: Result<Json<AgentQueryRequest>, JsonRejection>,
) -> Result<Json<AgentQueryResponse>, ApiError> {
    let Json(request) = payload?;
    if request.query.trim().is_empty() {
        return Err(ApiError::BadRequest("Query cannot be empty.".to_string()));
    }

    match state
        .orchestrator
        .handle(&request.query, request.chat_history)
        .await
    {
        Ok(response) => Ok(Json(AgentQueryResponse { response })),
        Err(failure) => Err(failure.into()),
    }
}

/// POST /query/structured - direct read-only fetch, bypassing the agent.
pub async fn structured_query(
    State(state): State<AppState>,
    payload: Result<Json<StructuredQueryRequest>, JsonRejection>,
) -> Result<Json<StructuredQueryResponse>, ApiError> {
    let Json(request) = payload?;
    let entity = request.entity.unwrap_or(EntityKind::Events);
    let store = state.store.clone();

    let (data, truncated) = tokio::task::spawn_blocking(move || -> Result<_, StoreError> {
        let match_id = request.match_id;
        let filters = request.filters;
        Ok(match entity {
            EntityKind::Events => to_values(store.fetch_events(&match_id, &filters)?),
            EntityKind::Tracking => to_values(store.fetch_tracking(&match_id, &filters)?),
        })
    })
    .await
    .map_err(|e| ApiError::Internal(format!("Store task failed: {}", e)))??;

    tracing::debug!(entity = %entity, rows = data.len(), truncated, "Structured query");

    if data.is_empty() {
        return Ok(Json(StructuredQueryResponse {
            message: Some(no_rows_message(entity)),
            data,
            truncated,
        }));
    }
    Ok(Json(StructuredQueryResponse {
        message: None,
        data,
        truncated,
    }))
}

fn no_rows_message(entity: EntityKind) -> String {
    let rows = match entity {
        EntityKind::Events => "events",
        EntityKind::Tracking => "tracking rows",
    };
    format!("The query was successful, but no {} matched the criteria.", rows)
}

fn to_values<T: Serialize>(fetched: Fetched<T>) -> (Vec<serde_json::Value>, bool) {
    let rows = fetched
        .rows
        .iter()
        .filter_map(|r| serde_json::to_value(r).ok())
        .collect();
    (rows, fetched.truncated)
}
