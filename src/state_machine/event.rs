//! Inputs to the reducer

use crate::agent::{AgentEvent, TurnId};
use std::path::PathBuf;

/// Events that fold into the view model
#[derive(Debug, Clone)]
pub enum Event {
    /// The user sent a prompt; opens `turn`
    UserMessage {
        turn: TurnId,
        message_id: String,
        text: String,
        cwd: PathBuf,
        model: Option<String>,
    },
    /// Decoded output of the agent for `turn`
    Agent { turn: TurnId, event: AgentEvent },
    /// Process-level failure on the error channel
    TurnFailed {
        turn: TurnId,
        entry_id: String,
        message: String,
    },
    /// End-of-stream marker for `turn`
    TurnComplete { turn: TurnId },
    /// User asked to stop; applied locally before the process dies
    Stop,
}

impl Event {
    pub fn user_message(
        turn: TurnId,
        text: impl Into<String>,
        cwd: impl Into<PathBuf>,
        model: Option<String>,
    ) -> Self {
        Event::UserMessage {
            turn,
            message_id: uuid::Uuid::new_v4().to_string(),
            text: text.into(),
            cwd: cwd.into(),
            model,
        }
    }

    pub fn turn_failed(turn: TurnId, message: impl Into<String>) -> Self {
        Event::TurnFailed {
            turn,
            entry_id: uuid::Uuid::new_v4().to_string(),
            message: message.into(),
        }
    }
}
