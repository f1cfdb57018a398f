//! Effects produced by state transitions

use crate::agent::{TurnId, TurnRequest};

/// Effects to be executed after a state transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Start the agent process for a freshly opened turn
    LaunchTurn { turn: TurnId, request: TurnRequest },

    /// Terminate the process of a turn that was closed locally
    AbortTurn { turn: TurnId },

    /// Push the new view model to connected clients
    PublishState,
}
