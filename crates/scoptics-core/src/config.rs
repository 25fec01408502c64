use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, ScopticsError};

/// Top-level configuration for the Scoptics query agent.
///
/// Loaded from `~/.scoptics/config.toml` by default. Each section corresponds
/// to one layer of the service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScopticsConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub llm: LlmConfig,
}

impl ScopticsConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ScopticsConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| ScopticsError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// Address the HTTP server binds to.
    pub bind_addr: String,
    /// HTTP server port.
    pub port: u16,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            bind_addr: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

/// Tracking/event store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Path to the SQLite database holding tracking, events and match metadata.
    pub database_path: String,
    /// Maximum rows returned by a single fetch before truncation.
    pub max_rows: usize,
    /// How long a read waits on a locked database before failing, in milliseconds.
    pub busy_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: "~/.scoptics/data/scoptics.db".to_string(),
            max_rows: 500,
            busy_timeout_ms: 5_000,
        }
    }
}

/// Query agent settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Number of recent turns the resolver looks at for context.
    pub context_turns: usize,
    /// Maximum turns retained in the returned conversation state.
    pub max_history_turns: usize,
    /// Maximum utterance length in characters.
    pub max_query_length: usize,
    /// Classification strategy: "rules" or "llm".
    pub classifier: String,
    /// Event type tags the resolver recognizes in utterances.
    pub event_types: Vec<String>,
    /// Largest frame gap still treated as one continuous moment when clustering.
    pub max_frame_gap: i64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            context_turns: 5,
            max_history_turns: 50,
            max_query_length: 2000,
            classifier: "rules".to_string(),
            event_types: vec![
                "pass".to_string(),
                "shot".to_string(),
                "pressure".to_string(),
                "cross".to_string(),
                "tackle".to_string(),
                "dribble".to_string(),
                "interception".to_string(),
                "2v1_final_third".to_string(),
            ],
            max_frame_gap: 10,
        }
    }
}

/// Language-understanding provider settings, used when `agent.classifier = "llm"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Base endpoint of the generateContent API.
    pub endpoint: String,
    /// Model name.
    pub model: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "gemini-1.5-pro-latest".to_string(),
            api_key_env: "GOOGLE_API_KEY".to_string(),
            temperature: 0.0,
            timeout_secs: 30,
        }
    }
}
