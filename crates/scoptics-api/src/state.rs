//! Application state shared across all route handlers.

use std::sync::Arc;
use std::time::Instant;

use scoptics_agent::{AgentOrchestrator, MatchCatalog};
use scoptics_core::config::ScopticsConfig;
use scoptics_storage::DataStore;

/// Shared application state.
///
/// Nothing here is mutable: conversation state travels with each request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ScopticsConfig>,
    pub orchestrator: Arc<AgentOrchestrator>,
    /// Store used by the structured query endpoint.
    pub store: Arc<dyn DataStore>,
    /// Catalog snapshot loaded at startup.
    pub catalog: Arc<MatchCatalog>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        config: ScopticsConfig,
        orchestrator: AgentOrchestrator,
        store: Arc<dyn DataStore>,
        catalog: Arc<MatchCatalog>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            orchestrator: Arc::new(orchestrator),
            store,
            catalog,
            start_time: Instant::now(),
        }
    }
}
