//! Runtime event loop

use super::{AgentMessage, ChannelObserver, RuntimeDeps};
use crate::agent::{next_turn_id, Orchestrator};
use crate::db::SessionSummary;
use crate::project::project_name;
use crate::session_cache::SessionCache;
use crate::settings::MODEL_KEY;
use crate::state_machine::{transition, Effect, Event, ViewModel};
use crate::transport::{Command, LiveState, UiEvent};
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

pub struct ChatRuntime {
    deps: RuntimeDeps,
    live: ViewModel,
    cache: SessionCache,
    orchestrators: HashMap<String, Orchestrator>,
    command_rx: mpsc::Receiver<Command>,
    agent_tx: mpsc::UnboundedSender<AgentMessage>,
    agent_rx: mpsc::UnboundedReceiver<AgentMessage>,
    broadcast_tx: broadcast::Sender<UiEvent>,
}

impl ChatRuntime {
    pub fn new(
        deps: RuntimeDeps,
        command_rx: mpsc::Receiver<Command>,
        broadcast_tx: broadcast::Sender<UiEvent>,
    ) -> Self {
        let (agent_tx, agent_rx) = mpsc::unbounded_channel();
        Self {
            deps,
            live: ViewModel::default(),
            cache: SessionCache::new(),
            orchestrators: HashMap::new(),
            command_rx,
            agent_tx,
            agent_rx,
            broadcast_tx,
        }
    }

    pub async fn run(mut self) {
        tracing::info!("Starting chat runtime");

        loop {
            tokio::select! {
                command = self.command_rx.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                Some(message) = self.agent_rx.recv() => self.handle_agent_message(message),
            }
        }

        for (session, orchestrator) in self.orchestrators.drain() {
            if orchestrator.is_running() {
                tracing::info!(session = %session, "Stopping turn on shutdown");
            }
            orchestrator.stop();
        }
        tracing::info!("Chat runtime stopped");
    }

    fn live_state(&self) -> LiveState {
        LiveState {
            session: self.cache.active_key().map(str::to_string),
            view: self.live.clone(),
        }
    }

    fn publish(&self, event: UiEvent) {
        let _ = self.broadcast_tx.send(event);
    }

    fn publish_state(&self) {
        self.publish(UiEvent::StateChanged(self.live_state()));
    }

    fn publish_error(&self, session: Option<&str>, message: impl Into<String>) {
        self.publish(UiEvent::Error {
            session: session.map(str::to_string),
            message: message.into(),
        });
    }

    // ==================== Commands ====================

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Execute { prompt, cwd, model } => self.execute(prompt, cwd, model),
            Command::Stop => match self.cache.active_key().map(str::to_string) {
                Some(session) => {
                    self.dispatch(&session, Event::Stop);
                }
                None => tracing::debug!("Stop with no active session"),
            },
            Command::SwitchSession { key } => {
                self.cache.switch(&mut self.live, key.as_deref());
                self.publish_state();
            }
            Command::DeleteSession { key } => self.delete_session(&key),
            Command::Snapshot { reply } => {
                let _ = reply.send(self.live_state());
            }
        }
    }

    fn execute(&mut self, prompt: String, cwd: PathBuf, model: Option<String>) {
        if prompt.trim().is_empty() {
            self.publish_error(self.cache.active_key(), "Prompt is empty");
            return;
        }

        let model = model
            .filter(|m| !m.trim().is_empty())
            .or_else(|| self.deps.settings.get_string(MODEL_KEY))
            .unwrap_or_else(|| self.deps.default_model.clone());

        let session = match self.cache.active_key() {
            Some(session) => session.to_string(),
            None => self.start_session(&prompt, &cwd),
        };

        let turn = next_turn_id();
        tracing::info!(session = %session, turn, model = %model, "Starting turn");
        if self.dispatch(&session, Event::user_message(turn, prompt, cwd, Some(model))) {
            self.record_progress(&session);
        }
    }

    /// Create and switch to a new session named after its first prompt
    fn start_session(&mut self, prompt: &str, cwd: &std::path::Path) -> String {
        let key = uuid::Uuid::new_v4().to_string();
        let summary = SessionSummary::new(key.clone(), prompt, project_name(cwd));
        tracing::info!(session = %key, title = %summary.title, "Created session");

        self.deps.sessions.save(&summary);
        self.cache.switch(&mut self.live, Some(&key));
        self.publish(UiEvent::SessionsChanged);
        key
    }

    fn delete_session(&mut self, key: &str) {
        if self.cache.active_key() == Some(key) {
            self.cache.switch(&mut self.live, None);
            self.publish_state();
        }
        self.cache.evict(key);
        self.deps.sessions.delete(key);
        if let Some(orchestrator) = self.orchestrators.remove(key) {
            orchestrator.stop();
        }
        tracing::info!(session = %key, "Deleted session");
        self.publish(UiEvent::SessionsChanged);
    }

    // ==================== Agent output ====================

    fn handle_agent_message(&mut self, message: AgentMessage) {
        match message {
            AgentMessage::Event {
                session,
                turn,
                event,
            } => {
                self.publish(UiEvent::Agent {
                    session: session.clone(),
                    turn,
                    event: event.clone(),
                });
                self.dispatch(&session, Event::Agent { turn, event });
            }
            AgentMessage::Error {
                session,
                turn,
                error,
            } => {
                self.publish_error(Some(&session), error.to_string());
                if error.is_fatal() {
                    self.dispatch(&session, Event::turn_failed(turn, error.to_string()));
                } else {
                    tracing::warn!(session = %session, turn, error = %error, "Skipping undecodable agent output");
                }
            }
            AgentMessage::Complete {
                session,
                turn,
                completion,
            } => {
                tracing::info!(
                    session = %session,
                    turn,
                    exit_code = ?completion.exit_code,
                    cancelled = completion.cancelled,
                    "Turn complete"
                );
                let applied = self.dispatch(&session, Event::TurnComplete { turn });
                self.publish(UiEvent::Complete {
                    session: session.clone(),
                    turn,
                    completion,
                });
                if applied {
                    self.record_progress(&session);
                }
            }
        }
    }

    // ==================== Reducer ====================

    fn view(&self, session: &str) -> Option<&ViewModel> {
        if self.cache.active_key() == Some(session) {
            Some(&self.live)
        } else {
            self.cache.get(session).map(|snapshot| &snapshot.view)
        }
    }

    fn store_view(&mut self, session: &str, view: ViewModel) {
        if self.cache.active_key() == Some(session) {
            self.live = view;
        } else if !self.cache.update(session, view) {
            tracing::debug!(session = %session, "No snapshot to fold background progress into");
        }
    }

    /// Fold `event` into the session's view model and carry out the effects.
    ///
    /// The session may be live or in the background. Returns whether the
    /// first event changed anything.
    fn dispatch(&mut self, session: &str, event: Event) -> bool {
        let mut pending = VecDeque::from([event]);
        let mut applied = false;
        let mut first = true;

        while let Some(event) = pending.pop_front() {
            let Some(view) = self.view(session) else {
                tracing::debug!(session = %session, "Dropping event for unknown session");
                return false;
            };

            let result = match transition(view, event, Utc::now()) {
                Ok(result) => result,
                Err(e) => {
                    tracing::warn!(session = %session, error = %e, "Rejected event");
                    self.publish_error(Some(session), e.to_string());
                    return applied;
                }
            };

            if first {
                applied = !result.is_noop();
                first = false;
            }
            self.store_view(session, result.new_state);

            for effect in result.effects {
                pending.extend(self.execute_effect(session, effect));
            }
        }
        applied
    }

    /// Run one effect. Returns events to feed back into the reducer.
    fn execute_effect(&mut self, session: &str, effect: Effect) -> Vec<Event> {
        match effect {
            Effect::LaunchTurn { turn, request } => {
                let orchestrator = self
                    .orchestrators
                    .entry(session.to_string())
                    .or_insert_with(|| Orchestrator::new(Arc::clone(&self.deps.command)));
                let observer = Arc::new(ChannelObserver::new(session, self.agent_tx.clone()));

                match orchestrator.execute(turn, &request, observer) {
                    Ok(()) => vec![],
                    Err(e) => {
                        tracing::error!(session = %session, turn, error = %e, "Failed to launch turn");
                        vec![
                            Event::turn_failed(turn, e.to_string()),
                            Event::TurnComplete { turn },
                        ]
                    }
                }
            }
            Effect::AbortTurn { turn } => {
                tracing::info!(session = %session, turn, "Aborting turn");
                if let Some(orchestrator) = self.orchestrators.get(session) {
                    orchestrator.stop();
                }
                vec![]
            }
            Effect::PublishState => {
                if self.cache.active_key() == Some(session) {
                    self.publish_state();
                }
                vec![]
            }
        }
    }

    /// Mirror transcript length and cost into the session list
    fn record_progress(&self, session: &str) {
        if let Some(view) = self.view(session) {
            let count = u32::try_from(view.transcript.len()).unwrap_or(u32::MAX);
            self.deps
                .sessions
                .update_metadata(session, Some(count), Some(view.cost));
            self.publish(UiEvent::SessionsChanged);
        }
    }
}
