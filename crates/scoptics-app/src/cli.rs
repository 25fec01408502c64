//! CLI argument definitions for the Scoptics server.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

/// Scoptics - conversational query agent over soccer tracking and event data.
#[derive(Parser, Debug)]
#[command(name = "scoptics", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// API server port.
    #[arg(short = 'p', long = "port")]
    pub port: Option<u16>,

    /// SQLite database holding tracking, events and match metadata.
    #[arg(short = 'd', long = "database")]
    pub database: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Intent classifier strategy ("rules" or "llm").
    #[arg(long = "classifier")]
    pub classifier: Option<String>,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > SCOPTICS_CONFIG env var > ~/.scoptics/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("SCOPTICS_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the API server port.
    ///
    /// Priority: --port flag > SCOPTICS_PORT env var > config file value > 8000.
    pub fn resolve_port(&self, config_port: u16) -> u16 {
        if let Some(p) = self.port {
            return p;
        }
        if let Ok(val) = std::env::var("SCOPTICS_PORT") {
            if let Ok(p) = val.parse::<u16>() {
                return p;
            }
        }
        if config_port != 0 {
            return config_port;
        }
        8000
    }

    /// Log level used before the configuration file is read.
    ///
    /// Priority: --log-level flag > "info".
    pub fn startup_log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or("info")
    }

    /// Resolve the database path.
    ///
    /// Priority: --database flag > SCOPTICS_DATABASE env var > config file value.
    /// Returns `None` if neither override is set.
    pub fn resolve_database(&self) -> Option<String> {
        if let Some(ref p) = self.database {
            return Some(p.to_string_lossy().to_string());
        }
        std::env::var("SCOPTICS_DATABASE").ok()
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".scoptics").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".scoptics").join("config.toml");
    }
    PathBuf::from("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_take_priority() {
        let args = CliArgs::parse_from([
            "scoptics",
            "--config",
            "/etc/scoptics.toml",
            "--port",
            "9000",
            "--database",
            "/data/matches.db",
            "--classifier",
            "llm",
        ]);
        assert_eq!(args.resolve_config_path(), PathBuf::from("/etc/scoptics.toml"));
        assert_eq!(args.resolve_port(8000), 9000);
        assert_eq!(args.resolve_database().as_deref(), Some("/data/matches.db"));
        assert_eq!(args.classifier.as_deref(), Some("llm"));
    }

    #[test]
    fn test_startup_log_level() {
        let args = CliArgs::parse_from(["scoptics"]);
        assert_eq!(args.startup_log_level(), "info");
        let args = CliArgs::parse_from(["scoptics", "-l", "debug"]);
        assert_eq!(args.startup_log_level(), "debug");
    }
}
