//! Session list schema and row type

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// SQL schema for initialization
pub const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    project_name TEXT NOT NULL,
    message_count INTEGER NOT NULL DEFAULT 0,
    total_cost REAL NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sessions_updated ON sessions(updated_at DESC);
";

/// Sidebar entry for one conversation. Transcripts are not persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: String,
    pub title: String,
    pub project_name: String,
    pub message_count: u32,
    pub total_cost: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Longest title kept before truncation
const TITLE_MAX_CHARS: usize = 40;

impl SessionSummary {
    /// Summary for a conversation started by `prompt`
    pub fn new(id: impl Into<String>, prompt: &str, project_name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            title: title_from_prompt(prompt),
            project_name: project_name.into(),
            message_count: 1,
            total_cost: 0.0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// First 40 characters of the prompt, with "..." when cut
pub(super) fn title_from_prompt(prompt: &str) -> String {
    let prompt = prompt.trim();
    if prompt.chars().count() > TITLE_MAX_CHARS {
        let head: String = prompt.chars().take(TITLE_MAX_CHARS).collect();
        format!("{head}...")
    } else {
        prompt.to_string()
    }
}
