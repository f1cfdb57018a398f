//! Boundary between the presentation layer and the runtime
//!
//! Commands go in over an mpsc channel and are fire-and-forget; outcomes come
//! back as `UiEvent`s on a broadcast channel. Sends toward the presentation
//! side are allowed to fail silently.

use crate::agent::{AgentEvent, Completion, TurnId};
use crate::state_machine::ViewModel;
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};

/// Requests from the presentation layer
#[derive(Debug)]
pub enum Command {
    Execute {
        prompt: String,
        cwd: PathBuf,
        model: Option<String>,
    },
    Stop,
    /// Switch to `key`, or to a fresh conversation when `None`
    SwitchSession { key: Option<String> },
    DeleteSession { key: String },
    Snapshot { reply: oneshot::Sender<LiveState> },
}

/// What is on screen right now
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiveState {
    pub session: Option<String>,
    pub view: ViewModel,
}

/// Notifications for connected clients
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UiEvent {
    /// Raw decoded agent output
    Agent {
        session: String,
        turn: TurnId,
        event: AgentEvent,
    },
    Error {
        session: Option<String>,
        message: String,
    },
    Complete {
        session: String,
        turn: TurnId,
        completion: Completion,
    },
    StateChanged(LiveState),
    /// The session list was modified
    SessionsChanged,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("Runtime is not running")]
    Closed,
}

/// Cloneable handle held by the presentation layer
#[derive(Clone)]
pub struct TransportHandle {
    commands: mpsc::Sender<Command>,
    events: broadcast::Sender<UiEvent>,
}

impl TransportHandle {
    pub fn new(commands: mpsc::Sender<Command>, events: broadcast::Sender<UiEvent>) -> Self {
        Self { commands, events }
    }

    async fn send(&self, command: Command) -> Result<(), TransportError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| TransportError::Closed)
    }

    pub async fn execute(
        &self,
        prompt: impl Into<String>,
        cwd: impl Into<PathBuf>,
        model: Option<String>,
    ) -> Result<(), TransportError> {
        self.send(Command::Execute {
            prompt: prompt.into(),
            cwd: cwd.into(),
            model,
        })
        .await
    }

    pub async fn stop(&self) -> Result<(), TransportError> {
        self.send(Command::Stop).await
    }

    pub async fn switch_session(&self, key: Option<String>) -> Result<(), TransportError> {
        self.send(Command::SwitchSession { key }).await
    }

    pub async fn delete_session(&self, key: impl Into<String>) -> Result<(), TransportError> {
        self.send(Command::DeleteSession { key: key.into() }).await
    }

    /// Current live state, after every command sent before this call
    pub async fn state(&self) -> Result<LiveState, TransportError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Snapshot { reply }).await?;
        rx.await.map_err(|_| TransportError::Closed)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UiEvent> {
        self.events.subscribe()
    }
}
