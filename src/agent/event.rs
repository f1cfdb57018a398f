//! Stream-json records emitted by the agent CLI
//!
//! Each stdout line is one JSON record. Only the fields this crate acts on
//! are modelled; everything else is ignored by serde.

use super::error::TurnError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A decoded agent event, consumed once by the reducer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// The agent issued the token used to resume this conversation later
    Init { conversation_token: String },
    /// Part of an assistant message: text and/or tool invocations
    AssistantChunk {
        message_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        text_delta: Option<String>,
        tool_invocations: Vec<ToolInvocation>,
    },
    /// Content-level end of the turn
    Result { outcome: Outcome, cost: f64 },
    /// The agent reported an unrecoverable error in-band
    Fatal { message: String },
}

impl AgentEvent {
    pub fn is_result(&self) -> bool {
        matches!(self, AgentEvent::Result { .. })
    }
}

/// How the agent judged the turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure,
}

/// A tool the agent asked to run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub id: String,
    pub name: String,
    pub input: Value,
}

// ============================================================================
// Wire format
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireRecord {
    System {
        #[serde(default)]
        subtype: Option<String>,
        #[serde(default)]
        session_id: Option<String>,
    },
    Assistant {
        message: WireMessage,
    },
    Result {
        #[serde(default)]
        subtype: Option<String>,
        #[serde(default)]
        total_cost_usd: Option<f64>,
    },
    Error {
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        error: Option<Value>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    content: Vec<WireBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireBlock {
    Text {
        #[serde(default)]
        text: String,
    },
    ToolUse {
        #[serde(default)]
        id: String,
        #[serde(default)]
        name: String,
        #[serde(default = "empty_object")]
        input: Value,
    },
    #[serde(other)]
    Other,
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

/// Decode one stdout line.
///
/// Returns `Ok(None)` for well-formed records this crate does not act on
/// (user echoes, non-init system records, thinking blocks, ...).
pub fn decode_line(line: &str) -> Result<Option<AgentEvent>, TurnError> {
    let record: WireRecord = serde_json::from_str(line).map_err(|e| TurnError::Protocol {
        line: line.to_string(),
        message: e.to_string(),
    })?;

    let event = match record {
        WireRecord::System {
            subtype,
            session_id,
        } => match (subtype.as_deref(), session_id) {
            (Some("init"), Some(token)) => Some(AgentEvent::Init {
                conversation_token: token,
            }),
            (Some("init"), None) => {
                return Err(TurnError::Protocol {
                    line: line.to_string(),
                    message: "init record without session_id".to_string(),
                })
            }
            _ => None,
        },
        WireRecord::Assistant { message } => Some(assistant_chunk(message)),
        WireRecord::Result {
            subtype,
            total_cost_usd,
        } => Some(AgentEvent::Result {
            outcome: if subtype.as_deref() == Some("success") {
                Outcome::Success
            } else {
                Outcome::Failure
            },
            cost: total_cost_usd.unwrap_or(0.0),
        }),
        WireRecord::Error { message, error } => Some(AgentEvent::Fatal {
            message: message
                .or_else(|| error.as_ref().and_then(error_message))
                .unwrap_or_else(|| "Agent reported an error".to_string()),
        }),
        WireRecord::Other => None,
    };

    Ok(event)
}

fn assistant_chunk(message: WireMessage) -> AgentEvent {
    let mut text = String::new();
    let mut tool_invocations = Vec::new();

    for block in message.content {
        match block {
            WireBlock::Text { text: t } => text.push_str(&t),
            WireBlock::ToolUse { id, name, input } => {
                tool_invocations.push(ToolInvocation { id, name, input });
            }
            WireBlock::Other => {}
        }
    }

    AgentEvent::AssistantChunk {
        message_id: message
            .id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        text_delta: (!text.is_empty()).then_some(text),
        tool_invocations,
    }
}

fn error_message(error: &Value) -> Option<String> {
    match error {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => map
            .get("message")
            .and_then(Value::as_str)
            .map(String::from),
        _ => None,
    }
}
