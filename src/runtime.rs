//! Runtime owning every conversation of one top-level session
//!
//! A single task holds the live view model, the snapshot cache and one
//! orchestrator per conversation. Agent output is funnelled back into the
//! same task, so all state changes are serialized.

mod executor;

pub use executor::ChatRuntime;

use crate::agent::{AgentCommand, AgentEvent, Completion, TurnError, TurnId, TurnObserver};
use crate::db::SessionStore;
use crate::settings::SettingsStore;
use crate::transport::TransportHandle;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

const COMMAND_BUFFER: usize = 32;
const UI_EVENT_BUFFER: usize = 256;

/// Orchestrator output tagged with the conversation it belongs to
#[derive(Debug)]
pub enum AgentMessage {
    Event {
        session: String,
        turn: TurnId,
        event: AgentEvent,
    },
    Error {
        session: String,
        turn: TurnId,
        error: TurnError,
    },
    Complete {
        session: String,
        turn: TurnId,
        completion: Completion,
    },
}

/// Forwards one conversation's turn outcomes into the runtime loop
pub struct ChannelObserver {
    session: String,
    tx: mpsc::UnboundedSender<AgentMessage>,
}

impl ChannelObserver {
    pub fn new(session: impl Into<String>, tx: mpsc::UnboundedSender<AgentMessage>) -> Self {
        Self {
            session: session.into(),
            tx,
        }
    }
}

impl TurnObserver for ChannelObserver {
    fn on_event(&self, turn: TurnId, event: AgentEvent) {
        let _ = self.tx.send(AgentMessage::Event {
            session: self.session.clone(),
            turn,
            event,
        });
    }

    fn on_error(&self, turn: TurnId, error: TurnError) {
        let _ = self.tx.send(AgentMessage::Error {
            session: self.session.clone(),
            turn,
            error,
        });
    }

    fn on_complete(&self, turn: TurnId, completion: Completion) {
        let _ = self.tx.send(AgentMessage::Complete {
            session: self.session.clone(),
            turn,
            completion,
        });
    }
}

/// Collaborators the runtime needs
#[derive(Clone)]
pub struct RuntimeDeps {
    pub command: Arc<dyn AgentCommand>,
    pub sessions: SessionStore,
    pub settings: SettingsStore,
    pub default_model: String,
}

/// Start the runtime task and return the handle that drives it.
///
/// The task ends once every handle is dropped; running turns are stopped.
pub fn spawn(deps: RuntimeDeps) -> TransportHandle {
    let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
    let (events_tx, _) = broadcast::channel(UI_EVENT_BUFFER);

    let runtime = ChatRuntime::new(deps, command_rx, events_tx.clone());
    tokio::spawn(runtime.run());

    TransportHandle::new(command_tx, events_tx)
}
