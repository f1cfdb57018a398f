//! Live view model of one conversation

use crate::agent::{ToolInvocation, TurnId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Who authored a transcript entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// Tool lifecycle as far as the agent's stream reports it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    Running,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolUseInfo {
    pub id: String,
    pub name: String,
    pub input: Value,
    pub status: ToolStatus,
}

impl From<ToolInvocation> for ToolUseInfo {
    fn from(invocation: ToolInvocation) -> Self {
        Self {
            id: invocation.id,
            name: invocation.name,
            input: invocation.input,
            status: ToolStatus::Running,
        }
    }
}

/// One transcript entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub is_streaming: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_use: Option<Vec<ToolUseInfo>>,
}

impl ChatMessage {
    pub fn user(id: impl Into<String>, content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            role: Role::User,
            content: content.into(),
            timestamp,
            is_streaming: false,
            tool_use: None,
        }
    }

    pub fn assistant(id: impl Into<String>, content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            role: Role::Assistant,
            content: content.into(),
            timestamp,
            is_streaming: false,
            tool_use: None,
        }
    }
}

/// Session status
///
/// `Idle -> Thinking -> Executing -> {Done, Error}`; `Idle` again only via
/// stop or a reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Idle,
    Thinking,
    Executing,
    Done,
    Error,
}

impl SessionStatus {
    /// The agent is still producing output for the open turn
    pub fn is_processing(self) -> bool {
        matches!(self, SessionStatus::Thinking | SessionStatus::Executing)
    }

    /// The open turn has reached its content-level end
    #[cfg(test)]
    pub fn is_settled(self) -> bool {
        matches!(self, SessionStatus::Done | SessionStatus::Error)
    }
}

/// Everything the presentation layer renders for one conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ViewModel {
    pub transcript: Vec<ChatMessage>,
    pub conversation_token: Option<String>,
    pub status: SessionStatus,
    pub cost: f64,
    pub active_tools: Vec<ToolUseInfo>,
    /// Index into `transcript` of the entry chunks are appended to
    #[serde(default)]
    pub streaming_entry: Option<usize>,
    /// Turn whose events are folded in; anything else is stale
    #[serde(default)]
    pub open_turn: Option<TurnId>,
}

impl ViewModel {
    /// Blank idle state of a new conversation
    pub fn reset(&mut self) {
        *self = ViewModel::default();
    }

    #[cfg(test)]
    pub fn is_blank(&self) -> bool {
        *self == ViewModel::default()
    }

    /// Mark the streaming entry final. No-op when nothing is streaming.
    pub fn finalize_streaming(&mut self) {
        if let Some(index) = self.streaming_entry.take() {
            if let Some(entry) = self.transcript.get_mut(index) {
                entry.is_streaming = false;
            }
        }
    }

    /// Append an entry, finalizing whatever was streaming before it
    pub fn push_entry(&mut self, entry: ChatMessage) {
        self.finalize_streaming();
        let streaming = entry.is_streaming;
        self.transcript.push(entry);
        if streaming {
            self.streaming_entry = Some(self.transcript.len() - 1);
        }
    }
}
