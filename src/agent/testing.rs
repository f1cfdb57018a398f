//! Test doubles for the orchestrator

use super::command::{AgentCommand, TurnRequest};
use super::error::TurnError;
use super::event::AgentEvent;
use super::orchestrator::{Completion, TurnId, TurnObserver};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::Notify;

/// Runs a fixed `sh -c` script in the request's working directory.
///
/// The request's prompt, resume token and model are exported as
/// `AGENT_PROMPT`, `AGENT_RESUME` and `AGENT_MODEL` so scripts can echo them.
pub struct ScriptCommand {
    script: String,
}

impl ScriptCommand {
    pub fn new(script: impl Into<String>) -> Self {
        Self {
            script: script.into(),
        }
    }
}

impl AgentCommand for ScriptCommand {
    fn build(&self, request: &TurnRequest) -> Command {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", &self.script])
            .current_dir(&request.cwd)
            .env("AGENT_PROMPT", &request.prompt)
            .env("AGENT_RESUME", request.resume_token.as_deref().unwrap_or(""))
            .env("AGENT_MODEL", request.model.as_deref().unwrap_or(""));
        cmd
    }

    fn program(&self) -> String {
        "sh".to_string()
    }
}

#[derive(Debug, Clone)]
pub enum Delivery {
    Event(TurnId, AgentEvent),
    Error(TurnId, TurnError),
    Complete(TurnId, Completion),
}

/// Observer that records every delivery in order
#[derive(Default)]
pub struct RecordingObserver {
    deliveries: Mutex<Vec<Delivery>>,
    changed: Notify,
}

impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().unwrap().clone()
    }

    fn record(&self, delivery: Delivery) {
        self.deliveries.lock().unwrap().push(delivery);
        self.changed.notify_waiters();
    }

    async fn wait_until(&self, done: impl Fn(&[Delivery]) -> bool) -> Vec<Delivery> {
        tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                let notified = self.changed.notified();
                let deliveries = self.deliveries();
                if done(&deliveries) {
                    return deliveries;
                }
                notified.await;
            }
        })
        .await
        .expect("timed out waiting for deliveries")
    }

    /// Wait until a completion has been recorded
    pub async fn wait_for_completion(&self) -> Vec<Delivery> {
        self.wait_until(|d| d.iter().any(|d| matches!(d, Delivery::Complete(..))))
            .await
    }

    /// Wait until at least `count` events have been recorded
    pub async fn wait_for_events(&self, count: usize) -> Vec<Delivery> {
        self.wait_until(|d| {
            d.iter()
                .filter(|d| matches!(d, Delivery::Event(..)))
                .count()
                >= count
        })
        .await
    }
}

impl TurnObserver for RecordingObserver {
    fn on_event(&self, turn: TurnId, event: AgentEvent) {
        self.record(Delivery::Event(turn, event));
    }

    fn on_error(&self, turn: TurnId, error: TurnError) {
        self.record(Delivery::Error(turn, error));
    }

    fn on_complete(&self, turn: TurnId, completion: Completion) {
        self.record(Delivery::Complete(turn, completion));
    }
}
