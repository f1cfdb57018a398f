//! Orchestrator error types

use serde::Serialize;
use thiserror::Error;

/// Failure delivered on a turn's error channel
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TurnError {
    /// A stdout line that could not be decoded; the stream continues
    #[error("Malformed agent output: {message}")]
    Protocol { line: String, message: String },
    /// The agent process could not be started
    #[error("Failed to start agent: {message}")]
    Spawn { message: String },
    /// The agent process ended with a failure status
    #[error("Agent exited with {}: {detail}", exit_label(.code))]
    Exit { code: Option<i32>, detail: String },
    /// Reading the process output or waiting on it failed
    #[error("Agent I/O failed: {message}")]
    Io { message: String },
}

impl TurnError {
    pub fn spawn(message: impl Into<String>) -> Self {
        TurnError::Spawn {
            message: message.into(),
        }
    }

    pub fn io(message: impl Into<String>) -> Self {
        TurnError::Io {
            message: message.into(),
        }
    }

    /// Protocol errors are surfaced but never end the turn
    pub fn is_fatal(&self) -> bool {
        !matches!(self, TurnError::Protocol { .. })
    }
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {code}"),
        None => "a signal".to_string(),
    }
}

/// Errors returned synchronously by the orchestrator
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrchestratorError {
    #[error("A turn is already running for this conversation")]
    TurnInProgress,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_display() {
        let err = TurnError::Exit {
            code: Some(2),
            detail: "bad flag".to_string(),
        };
        assert_eq!(err.to_string(), "Agent exited with code 2: bad flag");

        let err = TurnError::Exit {
            code: None,
            detail: "no output on stderr".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Agent exited with a signal: no output on stderr"
        );
    }

    #[test]
    fn test_only_protocol_errors_are_non_fatal() {
        assert!(TurnError::spawn("missing").is_fatal());
        assert!(TurnError::io("broken pipe").is_fatal());
        assert!(!TurnError::Protocol {
            line: String::new(),
            message: String::new()
        }
        .is_fatal());
    }
}
