//! Per-conversation owner of the agent process
//!
//! One turn = one process. Output is read line by line on a background
//! task, decoded, and delivered to the single current observer.

use super::command::{AgentCommand, TurnRequest};
use super::error::{OrchestratorError, TurnError};
use super::event::{decode_line, AgentEvent};
use serde::Serialize;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[cfg(unix)]
use nix::sys::signal::{killpg, Signal};
#[cfg(unix)]
use nix::unistd::Pid;

/// Identifies one turn across all conversations
pub type TurnId = u64;

static NEXT_TURN_ID: AtomicU64 = AtomicU64::new(1);

/// Allocate a process-wide unique turn id
pub fn next_turn_id() -> TurnId {
    NEXT_TURN_ID.fetch_add(1, Ordering::SeqCst)
}

/// End-of-stream marker for a turn, sent exactly once per turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Completion {
    pub exit_code: Option<i32>,
    /// The turn ended because `stop()` was called
    pub cancelled: bool,
    /// A `Result` record was seen before the stream ended
    pub saw_result: bool,
}

/// Receives a turn's outcomes. At most one is installed per orchestrator.
pub trait TurnObserver: Send + Sync {
    fn on_event(&self, turn: TurnId, event: AgentEvent);
    fn on_error(&self, turn: TurnId, error: TurnError);
    fn on_complete(&self, turn: TurnId, completion: Completion);
}

struct InFlight {
    turn: TurnId,
    cancel: CancellationToken,
}

#[derive(Default)]
struct Shared {
    observer: Mutex<Option<Arc<dyn TurnObserver>>>,
    in_flight: Mutex<Option<InFlight>>,
}

impl Shared {
    fn current_observer(&self) -> Option<Arc<dyn TurnObserver>> {
        lock_unpoisoned(&self.observer).clone()
    }

    fn emit_event(&self, turn: TurnId, event: AgentEvent) {
        if let Some(observer) = self.current_observer() {
            observer.on_event(turn, event);
        }
    }

    fn emit_error(&self, turn: TurnId, error: TurnError) {
        if let Some(observer) = self.current_observer() {
            observer.on_error(turn, error);
        }
    }

    fn emit_complete(&self, turn: TurnId, completion: Completion) {
        if let Some(observer) = self.current_observer() {
            observer.on_complete(turn, completion);
        }
    }

    /// Clear the in-flight slot if it still belongs to `turn`
    fn release(&self, turn: TurnId) {
        let mut in_flight = lock_unpoisoned(&self.in_flight);
        if in_flight.as_ref().is_some_and(|f| f.turn == turn) {
            *in_flight = None;
        }
    }
}

/// Launches and cancels the agent process for one conversation
pub struct Orchestrator {
    command: Arc<dyn AgentCommand>,
    shared: Arc<Shared>,
}

impl Orchestrator {
    pub fn new(command: Arc<dyn AgentCommand>) -> Self {
        Self {
            command,
            shared: Arc::new(Shared::default()),
        }
    }

    /// Install `observer` as the only receiver, replacing any previous one
    pub fn subscribe(&self, observer: Arc<dyn TurnObserver>) {
        *lock_unpoisoned(&self.shared.observer) = Some(observer);
    }

    /// Whether a turn is currently running and not yet stopped
    pub fn is_running(&self) -> bool {
        lock_unpoisoned(&self.shared.in_flight).is_some()
    }

    /// Start a turn. Must be called from within a tokio runtime.
    ///
    /// Outcomes arrive on `observer`, which replaces the previous observer
    /// before anything is spawned. Spawn failures are delivered there too,
    /// followed by the completion, so callers never wait on a turn that
    /// never started.
    pub fn execute(
        &self,
        turn: TurnId,
        request: &TurnRequest,
        observer: Arc<dyn TurnObserver>,
    ) -> Result<(), OrchestratorError> {
        let mut in_flight = lock_unpoisoned(&self.shared.in_flight);
        if in_flight.is_some() {
            return Err(OrchestratorError::TurnInProgress);
        }

        self.subscribe(observer);

        let mut cmd = self.command.build(request);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // Own process group, so stop() also reaches the agent's children
        #[cfg(unix)]
        cmd.process_group(0);

        let child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                drop(in_flight);
                tracing::error!(
                    turn,
                    program = %self.command.program(),
                    error = %e,
                    "Failed to spawn agent"
                );
                self.shared
                    .emit_error(turn, TurnError::spawn(format!("{}: {e}", self.command.program())));
                self.shared.emit_complete(
                    turn,
                    Completion {
                        exit_code: None,
                        cancelled: false,
                        saw_result: false,
                    },
                );
                return Ok(());
            }
        };

        tracing::info!(
            turn,
            pid = child.id(),
            cwd = %request.cwd.display(),
            resume = request.resume_token.is_some(),
            model = request.model.as_deref().unwrap_or("default"),
            "Agent turn started"
        );

        let cancel = CancellationToken::new();
        *in_flight = Some(InFlight {
            turn,
            cancel: cancel.clone(),
        });
        drop(in_flight);

        tokio::spawn(drive_turn(Arc::clone(&self.shared), turn, child, cancel));
        Ok(())
    }

    /// Request termination of the running turn. Never blocks.
    ///
    /// The slot is released immediately so a new turn may start; whatever
    /// the old process still emits is tagged with its own turn id.
    pub fn stop(&self) {
        let in_flight = lock_unpoisoned(&self.shared.in_flight).take();
        if let Some(in_flight) = in_flight {
            tracing::info!(turn = in_flight.turn, "Stopping agent turn");
            in_flight.cancel.cancel();
        }
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn drive_turn(shared: Arc<Shared>, turn: TurnId, mut child: Child, cancel: CancellationToken) {
    let pid = child.id();
    let stderr_task = child.stderr.take().map(|stderr| spawn_stderr_reader(turn, stderr));

    let mut saw_result = false;
    let mut cancelled = false;

    if let Some(stdout) = child.stdout.take() {
        let mut reader = BufReader::new(stdout);
        loop {
            tokio::select! {
                biased;

                () = cancel.cancelled() => {
                    kill_process_group(pid);
                    cancelled = true;
                    break;
                }

                record = next_record(&mut reader) => match record {
                    Ok(Some(Record::Text(line))) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        match decode_line(&line) {
                            Ok(Some(event)) => {
                                saw_result |= event.is_result();
                                shared.emit_event(turn, event);
                            }
                            Ok(None) => {}
                            Err(error) => {
                                tracing::warn!(turn, error = %error, "Skipping malformed agent output");
                                shared.emit_error(turn, error);
                            }
                        }
                    }
                    Ok(Some(Record::NotUtf8(line))) => {
                        tracing::warn!(turn, "Skipping agent output that is not valid UTF-8");
                        shared.emit_error(
                            turn,
                            TurnError::Protocol {
                                line,
                                message: "output is not valid UTF-8".to_string(),
                            },
                        );
                    }
                    Ok(None) => break,
                    Err(e) => {
                        shared.emit_error(turn, TurnError::io(format!("reading output: {e}")));
                        break;
                    }
                },
            }
        }
    }

    let status = child.wait().await;
    let last_stderr = match stderr_task {
        Some(task) => task.await.ok().flatten(),
        None => None,
    };

    let exit_code = match status {
        Ok(status) => {
            if !status.success() && !cancelled {
                shared.emit_error(
                    turn,
                    TurnError::Exit {
                        code: status.code(),
                        detail: last_stderr.unwrap_or_else(|| "no output on stderr".to_string()),
                    },
                );
            }
            status.code()
        }
        Err(e) => {
            shared.emit_error(turn, TurnError::io(format!("waiting for exit: {e}")));
            None
        }
    };

    tracing::info!(turn, exit_code, cancelled, saw_result, "Agent turn finished");

    shared.release(turn);
    shared.emit_complete(
        turn,
        Completion {
            exit_code,
            cancelled,
            saw_result,
        },
    );
}

/// Log stderr at debug and keep the last non-empty line for error reports
fn spawn_stderr_reader(turn: TurnId, stderr: ChildStderr) -> JoinHandle<Option<String>> {
    tokio::spawn(async move {
        let mut last = None;
        let mut reader = BufReader::new(stderr);
        while let Ok(Some(record)) = next_record(&mut reader).await {
            let line = record.into_lossy();
            if !line.trim().is_empty() {
                tracing::debug!(turn, "agent stderr: {}", line);
                last = Some(line);
            }
        }
        last
    })
}

/// One newline-terminated chunk of process output
enum Record {
    Text(String),
    /// Bytes that failed UTF-8 decoding, converted lossily
    NotUtf8(String),
}

impl Record {
    fn into_lossy(self) -> String {
        match self {
            Record::Text(text) | Record::NotUtf8(text) => text,
        }
    }
}

/// Read up to the next newline. `None` at end of stream.
async fn next_record<R>(reader: &mut R) -> std::io::Result<Option<Record>>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    if reader.read_until(b'\n', &mut buf).await? == 0 {
        return Ok(None);
    }
    while matches!(buf.last(), Some(b'\n' | b'\r')) {
        buf.pop();
    }
    Ok(Some(match String::from_utf8(buf) {
        Ok(text) => Record::Text(text),
        Err(e) => Record::NotUtf8(String::from_utf8_lossy(e.as_bytes()).into_owned()),
    }))
}

/// Terminate the agent and everything it started
#[cfg(unix)]
fn kill_process_group(pid: Option<u32>) {
    let Some(pid) = pid else { return };
    let Ok(raw) = i32::try_from(pid) else { return };
    tracing::debug!(pgid = pid, "Sending SIGTERM to agent process group");
    let _ = killpg(Pid::from_raw(raw), Signal::SIGTERM);
}

#[cfg(not(unix))]
fn kill_process_group(_pid: Option<u32>) {
    // kill_on_drop reaps the child when the handle goes away
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
