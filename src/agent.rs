//! Agent process orchestration
//!
//! Launches the external agent CLI once per turn, decodes its stream-json
//! output and delivers events, errors and the completion marker to one
//! observer.

mod command;
mod error;
mod event;
mod orchestrator;

#[cfg(test)]
pub mod testing;

pub use command::{AgentCommand, ClaudeCli, TurnRequest};
pub use error::TurnError;
pub use event::{AgentEvent, Outcome, ToolInvocation};
pub use orchestrator::{next_turn_id, Completion, Orchestrator, TurnId, TurnObserver};
