//! Building the agent process for one turn

use std::path::PathBuf;
use tokio::process::Command;

/// Everything needed to launch one turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnRequest {
    pub prompt: String,
    pub cwd: PathBuf,
    /// Token from a previous turn's `Init`, continues that conversation
    pub resume_token: Option<String>,
    pub model: Option<String>,
}

/// Builds the process for a turn.
///
/// The orchestrator owns stdio, process-group and cleanup configuration;
/// implementations only choose the program, arguments and directory.
pub trait AgentCommand: Send + Sync {
    fn build(&self, request: &TurnRequest) -> Command;

    /// Program name used in log fields
    fn program(&self) -> String;
}

/// The `claude` CLI in non-interactive stream-json mode
#[derive(Debug, Clone)]
pub struct ClaudeCli {
    binary: PathBuf,
}

impl ClaudeCli {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Resolve `name` on `PATH`, falling back to the bare name so the
    /// spawn error names what was attempted.
    pub fn locate(name: &str) -> Self {
        match which::which(name) {
            Ok(path) => {
                tracing::info!(path = %path.display(), "Located agent CLI");
                Self::new(path)
            }
            Err(e) => {
                tracing::warn!(name, error = %e, "Agent CLI not found on PATH");
                Self::new(name)
            }
        }
    }

    fn arguments(request: &TurnRequest) -> Vec<String> {
        let mut args = vec![
            "-p".to_string(),
            request.prompt.clone(),
            "--output-format".to_string(),
            "stream-json".to_string(),
            "--verbose".to_string(),
        ];
        if let Some(token) = &request.resume_token {
            args.push("--resume".to_string());
            args.push(token.clone());
        }
        if let Some(model) = &request.model {
            args.push("--model".to_string());
            args.push(model.clone());
        }
        args
    }
}

impl AgentCommand for ClaudeCli {
    fn build(&self, request: &TurnRequest) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.args(Self::arguments(request)).current_dir(&request.cwd);
        cmd
    }

    fn program(&self) -> String {
        self.binary.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> TurnRequest {
        TurnRequest {
            prompt: "list files".to_string(),
            cwd: PathBuf::from("/repo"),
            resume_token: None,
            model: None,
        }
    }

    #[test]
    fn test_first_turn_arguments() {
        assert_eq!(
            ClaudeCli::arguments(&request()),
            vec!["-p", "list files", "--output-format", "stream-json", "--verbose"]
        );
    }

    #[test]
    fn test_resume_and_model_arguments() {
        let request = TurnRequest {
            resume_token: Some("abc".to_string()),
            model: Some("opus".to_string()),
            ..request()
        };
        let args = ClaudeCli::arguments(&request);
        assert_eq!(
            &args[5..],
            &["--resume", "abc", "--model", "opus"].map(String::from)
        );
    }

    #[test]
    fn test_build_sets_working_directory() {
        let cmd = ClaudeCli::new("/usr/bin/claude").build(&request());
        let std_cmd = cmd.as_std();
        assert_eq!(std_cmd.get_program(), "/usr/bin/claude");
        assert_eq!(
            std_cmd.get_current_dir(),
            Some(std::path::Path::new("/repo"))
        );
    }
}
