//! Pure state transition function
//!
//! Every event is folded into a fresh copy of the view model so transcript,
//! status, tools and cost always move together.

use super::state::{ChatMessage, Role, SessionStatus, ToolUseInfo, ViewModel};
use super::{Effect, Event};
use crate::agent::{AgentEvent, Outcome, TurnId, TurnRequest};
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: ViewModel,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: ViewModel) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    /// Nothing changed
    fn unchanged(state: &ViewModel) -> Self {
        Self::new(state.clone())
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn is_noop(&self) -> bool {
        self.effects.is_empty()
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("A turn is already running for this conversation (stop it first)")]
    TurnInProgress,
    #[error("Prompt is empty")]
    EmptyPrompt,
}

/// Pure transition function
///
/// Events for a turn other than the open one are stale and fold to a no-op,
/// which is how trailing output after a stop is tolerated.
pub fn transition(
    state: &ViewModel,
    event: Event,
    now: DateTime<Utc>,
) -> Result<TransitionResult, TransitionError> {
    match event {
        Event::UserMessage {
            turn,
            message_id,
            text,
            cwd,
            model,
        } => open_turn(state, turn, message_id, text, cwd, model, now),

        Event::Stop => Ok(stop(state)),

        Event::Agent { turn, .. }
        | Event::TurnFailed { turn, .. }
        | Event::TurnComplete { turn }
            if state.open_turn != Some(turn) =>
        {
            tracing::debug!(turn, open_turn = ?state.open_turn, "Dropping stale turn event");
            Ok(TransitionResult::unchanged(state))
        }

        Event::Agent { event, .. } => Ok(apply_agent_event(state, event, now)),

        Event::TurnFailed {
            entry_id, message, ..
        } => Ok(fail(state, entry_id, &message, now)),

        Event::TurnComplete { .. } => Ok(complete(state)),
    }
}

fn open_turn(
    state: &ViewModel,
    turn: TurnId,
    message_id: String,
    text: String,
    cwd: PathBuf,
    model: Option<String>,
    now: DateTime<Utc>,
) -> Result<TransitionResult, TransitionError> {
    if state.open_turn.is_some() {
        return Err(TransitionError::TurnInProgress);
    }
    if text.trim().is_empty() {
        return Err(TransitionError::EmptyPrompt);
    }

    let mut next = state.clone();
    next.push_entry(ChatMessage::user(message_id, text.clone(), now));
    next.status = SessionStatus::Thinking;
    next.active_tools.clear();
    next.open_turn = Some(turn);

    let request = TurnRequest {
        prompt: text,
        cwd,
        resume_token: next.conversation_token.clone(),
        model,
    };
    Ok(TransitionResult::new(next)
        .with_effect(Effect::LaunchTurn { turn, request })
        .with_effect(Effect::PublishState))
}

fn apply_agent_event(state: &ViewModel, event: AgentEvent, now: DateTime<Utc>) -> TransitionResult {
    match event {
        AgentEvent::Fatal { message } => fail(state, uuid::Uuid::new_v4().to_string(), &message, now),

        // Content after Result or Fatal belongs to a settled turn
        _ if !state.status.is_processing() => TransitionResult::unchanged(state),

        AgentEvent::Init { conversation_token } => {
            let mut next = state.clone();
            next.conversation_token = Some(conversation_token);
            next.status = SessionStatus::Thinking;
            TransitionResult::new(next).with_effect(Effect::PublishState)
        }

        AgentEvent::AssistantChunk {
            message_id,
            text_delta,
            tool_invocations,
        } => {
            let mut next = state.clone();
            let tools: Vec<ToolUseInfo> = tool_invocations.into_iter().map(ToolUseInfo::from).collect();

            if let Some(delta) = text_delta.filter(|d| !d.is_empty()) {
                append_text(&mut next, message_id, &delta, &tools, now);
            }
            if !tools.is_empty() {
                next.active_tools = tools;
                next.status = SessionStatus::Executing;
            }

            if next == *state {
                TransitionResult::new(next)
            } else {
                TransitionResult::new(next).with_effect(Effect::PublishState)
            }
        }

        AgentEvent::Result { outcome, cost } => {
            let mut next = state.clone();
            next.status = match outcome {
                Outcome::Success => SessionStatus::Done,
                Outcome::Failure => SessionStatus::Error,
            };
            next.cost = cost;
            next.active_tools.clear();
            next.finalize_streaming();
            TransitionResult::new(next).with_effect(Effect::PublishState)
        }
    }
}

/// Extend the streaming assistant entry, or start one
fn append_text(
    view: &mut ViewModel,
    message_id: String,
    delta: &str,
    tools: &[ToolUseInfo],
    now: DateTime<Utc>,
) {
    let streaming = view.streaming_entry.and_then(|i| view.transcript.get_mut(i));
    match streaming {
        Some(entry) if entry.role == Role::Assistant && entry.is_streaming => {
            entry.content.push_str(delta);
            if !tools.is_empty() {
                entry.tool_use = Some(tools.to_vec());
            }
        }
        _ => {
            let mut entry = ChatMessage::assistant(message_id, delta, now);
            entry.is_streaming = true;
            if !tools.is_empty() {
                entry.tool_use = Some(tools.to_vec());
            }
            view.push_entry(entry);
        }
    }
}

/// Fatal record or process failure: the error becomes part of the transcript
fn fail(state: &ViewModel, entry_id: String, message: &str, now: DateTime<Utc>) -> TransitionResult {
    let mut next = state.clone();
    next.push_entry(ChatMessage::assistant(entry_id, format!("Error: {message}"), now));
    next.status = SessionStatus::Error;
    next.active_tools.clear();
    TransitionResult::new(next).with_effect(Effect::PublishState)
}

fn complete(state: &ViewModel) -> TransitionResult {
    let mut next = state.clone();
    if next.status.is_processing() {
        next.status = SessionStatus::Done;
    }
    next.active_tools.clear();
    next.finalize_streaming();
    next.open_turn = None;
    TransitionResult::new(next).with_effect(Effect::PublishState)
}

fn stop(state: &ViewModel) -> TransitionResult {
    let mut next = state.clone();
    next.status = SessionStatus::Idle;
    next.active_tools.clear();
    next.finalize_streaming();

    let mut result = match next.open_turn.take() {
        Some(turn) => TransitionResult::new(next).with_effect(Effect::AbortTurn { turn }),
        None => TransitionResult::new(next),
    };
    if result.new_state != *state {
        result = result.with_effect(Effect::PublishState);
    }
    result
}
