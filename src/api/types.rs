//! API request and response types

use crate::db::SessionSummary;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request to run a prompt in the active (or a new) session
#[derive(Debug, Deserialize)]
pub struct ExecuteRequest {
    pub prompt: String,
    /// Defaults to the `projectDir` setting
    #[serde(default)]
    pub cwd: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct QueuedResponse {
    pub queued: bool,
}

#[derive(Debug, Serialize)]
pub struct SessionListResponse {
    pub sessions: Vec<SessionSummary>,
    pub active: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SelectFolderRequest {
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SelectFolderResponse {
    pub path: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SettingResponse {
    pub key: String,
    pub value: Value,
}

#[derive(Debug, Deserialize)]
pub struct SetSettingRequest {
    pub value: Value,
}

/// Generic success response
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
