//! Scoptics server binary - composition root.
//!
//! 1. Parse CLI flags, start logging, and load configuration from TOML
//! 2. Open the match store read-only and load the match catalog
//! 3. Pick the intent classifier (rules or Gemini-backed)
//! 4. Build the agent orchestrator and start the axum API server

mod cli;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, reload, EnvFilter};

use scoptics_agent::{
    AgentOrchestrator, GeminiClient, GeminiClientConfig, IntentClassifier, LlmClassifier,
    LlmClassifierConfig, MatchCatalog, RuleClassifier,
};
use scoptics_api::routes;
use scoptics_api::state::AppState;
use scoptics_core::config::ScopticsConfig;
use scoptics_core::error::ScopticsError;
use scoptics_storage::{DataStore, Database, SqliteStore};

use crate::cli::CliArgs;

/// Expand ~ to home directory in a path string.
fn expand_home(path: &str) -> PathBuf {
    if path.starts_with("~/") || path.starts_with("~\\") {
        #[cfg(target_os = "windows")]
        let home = std::env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string());
        #[cfg(not(target_os = "windows"))]
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(&path[2..])
    } else {
        PathBuf::from(path)
    }
}

/// Build the configured classifier strategy.
fn build_classifier(config: &ScopticsConfig) -> Result<Arc<dyn IntentClassifier>, ScopticsError> {
    match config.agent.classifier.as_str() {
        "rules" => Ok(Arc::new(RuleClassifier::new(&config.agent.event_types))),
        "llm" | "gemini" => {
            let api_key = std::env::var(&config.llm.api_key_env).map_err(|_| {
                ScopticsError::Config(format!(
                    "classifier \"{}\" needs the {} environment variable",
                    config.agent.classifier, config.llm.api_key_env
                ))
            })?;
            let client = GeminiClient::new(GeminiClientConfig::from_llm_config(&config.llm, api_key))
                .map_err(|e| ScopticsError::Config(format!("Failed to build LLM client: {}", e)))?;
            tracing::info!(model = %config.llm.model, "Using LLM intent classifier");
            Ok(Arc::new(LlmClassifier::new(
                client,
                LlmClassifierConfig::new(&config.llm, &config.agent),
            )))
        }
        other => Err(ScopticsError::Config(format!(
            "unknown classifier \"{}\" (expected \"rules\" or \"llm\")",
            other
        ))),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Tracing. RUST_LOG wins; otherwise the flag, then "info" until the
    // configured level is known.
    let env_filter = EnvFilter::try_from_default_env().ok();
    let from_env = env_filter.is_some();
    let provisional = env_filter.unwrap_or_else(|| EnvFilter::new(args.startup_log_level()));
    let (filter, filter_handle) = reload::Layer::new(provisional);
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();

    // Config.
    let config_file = args.resolve_config_path();
    let mut config = ScopticsConfig::load_or_default(&config_file);
    config.general.port = args.resolve_port(config.general.port);
    if let Some(db) = args.resolve_database() {
        config.store.database_path = db;
    }
    if let Some(level) = &args.log_level {
        config.general.log_level = level.clone();
    }
    if let Some(classifier) = &args.classifier {
        config.agent.classifier = classifier.clone();
    }

    if !from_env {
        filter_handle.reload(EnvFilter::new(&config.general.log_level))?;
    }

    tracing::info!("Starting Scoptics v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration loaded");

    // Storage.
    let db_path = expand_home(&config.store.database_path);
    let db = match Database::open_read_only(
        &db_path,
        Duration::from_millis(config.store.busy_timeout_ms),
    ) {
        Ok(db) => db,
        Err(e) => {
            tracing::error!(path = %db_path.display(), error = %e, "Failed to open match store");
            return Err(e.into());
        }
    };
    tracing::info!(path = %db_path.display(), "Match store opened read-only");

    let store = Arc::new(SqliteStore::new(Arc::new(db), config.store.max_rows));
    let catalog = Arc::new(MatchCatalog::new(store.list_matches()?));
    tracing::info!(matches = catalog.len(), "Match catalog loaded");

    // Agent.
    let classifier = build_classifier(&config)?;
    let orchestrator = AgentOrchestrator::new(
        &config.agent,
        store.max_rows(),
        classifier,
        store.clone(),
        Arc::clone(&catalog),
    );
    tracing::info!(
        classifier = orchestrator.classifier_name(),
        context_turns = config.agent.context_turns,
        max_history_turns = config.agent.max_history_turns,
        "Query agent ready"
    );

    // API server.
    let state = AppState::new(config.clone(), orchestrator, store, catalog);
    routes::start_server(&config, state).await?;

    Ok(())
}
