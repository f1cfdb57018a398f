//! Environment-driven configuration

use std::path::PathBuf;

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_MODEL: &str = "sonnet";
const DATA_DIR: &str = ".claude-visual-agent";

/// Server configuration, read once at startup
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub db_path: PathBuf,
    pub settings_path: PathBuf,
    /// Explicit agent binary; `None` means locate `claude` on `PATH`
    pub claude_bin: Option<PathBuf>,
    pub default_model: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let data_dir = var("HOME")
            .map_or_else(|| PathBuf::from("."), PathBuf::from)
            .join(DATA_DIR);

        let port = match var("VISUAL_AGENT_PORT") {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                tracing::warn!(value = %raw, "Invalid VISUAL_AGENT_PORT, using default");
                DEFAULT_PORT
            }),
            None => DEFAULT_PORT,
        };

        Self {
            port,
            db_path: var("VISUAL_AGENT_DB_PATH")
                .map_or_else(|| data_dir.join("sessions.db"), PathBuf::from),
            settings_path: var("VISUAL_AGENT_SETTINGS_PATH")
                .map_or_else(|| data_dir.join("settings.json"), PathBuf::from),
            claude_bin: var("VISUAL_AGENT_CLAUDE_BIN").map(PathBuf::from),
            default_model: var("VISUAL_AGENT_DEFAULT_MODEL")
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        }
    }
}
