//! Execution backends.
//!
//! The orchestrator is parameterized over an [`ExecutionBackend`]: the same
//! bookkeeping drives jobs as in-process tasks or as one isolated worker
//! process per job. A backend receives the job's addressed control channel
//! and the lifecycle channel the orchestrator observes, runs the job to its
//! terminal state, and returns the outcome.

use std::path::PathBuf;
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{ChildStdin, Command};
use tokio::sync::mpsc;

use crate::error::JobError;
use crate::events::{ControlEvent, LifecycleEvent};
use crate::state_machine::{JobId, JobInput, JobRunner, RunnerConfig};
use crate::wire::{self, Target, WireMessage, WirePayload};

pub trait ExecutionBackend: Send + Sync + 'static {
    /// Run one job to completion. Must deliver every lifecycle event the job
    /// emits into `events`, in emission order, and resolve only once the job
    /// is terminal.
    fn run_job(
        &self,
        id: JobId,
        input: JobInput,
        control: mpsc::Receiver<ControlEvent>,
        events: mpsc::Sender<LifecycleEvent>,
    ) -> impl Future<Output = Result<(), JobError>> + Send;
}

/// Runs every job as a task inside the current runtime.
#[derive(Debug, Clone)]
pub struct InProcessBackend {
    config: RunnerConfig,
}

impl InProcessBackend {
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }
}

impl ExecutionBackend for InProcessBackend {
    fn run_job(
        &self,
        id: JobId,
        input: JobInput,
        control: mpsc::Receiver<ControlEvent>,
        events: mpsc::Sender<LifecycleEvent>,
    ) -> impl Future<Output = Result<(), JobError>> + Send {
        let config = self.config.clone();
        async move {
            let mut runner = JobRunner::new(id, input, config, events, control);
            runner.start().await
        }
    }
}

/// Runs every job inside its own worker process, mirroring events over the
/// newline-JSON wire protocol on the child's stdin/stdout.
#[derive(Debug, Clone)]
pub struct ProcessBackend {
    program: PathBuf,
    config: RunnerConfig,
    inject_fault: bool,
}

impl ProcessBackend {
    /// `program` is the binary to spawn; it must understand the hidden
    /// `worker` subcommand (normally the current executable).
    pub fn new(program: PathBuf, config: RunnerConfig) -> Self {
        Self {
            program,
            config,
            inject_fault: false,
        }
    }

    /// Variant whose workers panic instead of running their job. Exercises
    /// the worker's uncaught-fault reporting.
    pub fn with_fault_injection(program: PathBuf, config: RunnerConfig) -> Self {
        Self {
            program,
            config,
            inject_fault: true,
        }
    }
}

impl ExecutionBackend for ProcessBackend {
    fn run_job(
        &self,
        id: JobId,
        input: JobInput,
        control: mpsc::Receiver<ControlEvent>,
        events: mpsc::Sender<LifecycleEvent>,
    ) -> impl Future<Output = Result<(), JobError>> + Send {
        let program = self.program.clone();
        let config = self.config.clone();
        let inject_fault = self.inject_fault;
        async move { run_in_worker(program, config, inject_fault, id, input, control, events).await }
    }
}

async fn run_in_worker(
    program: PathBuf,
    config: RunnerConfig,
    inject_fault: bool,
    id: JobId,
    input: JobInput,
    mut control: mpsc::Receiver<ControlEvent>,
    events: mpsc::Sender<LifecycleEvent>,
) -> Result<(), JobError> {
    let mut command = Command::new(&program);
    command
        .arg("worker")
        .arg("--work-delay-ms")
        .arg(config.work_delay.as_millis().to_string())
        .arg("--stage2-max-polls")
        .arg(config.stage2_max_polls.to_string());
    if inject_fault {
        command.arg("--inject-fault");
    }
    let mut child = command
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| std::io::Error::other("worker stdin unavailable"))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| std::io::Error::other("worker stdout unavailable"))?;
    let mut lines = BufReader::new(stdout).lines();

    send_line(&mut stdin, WirePayload::Start { id, input }).await?;

    let mut control_open = true;
    let outcome = loop {
        tokio::select! {
            event = control.recv(), if control_open => match event {
                // Mirror addressed control events across the boundary.
                Some(event) => {
                    if send_line(&mut stdin, event.into()).await.is_err() {
                        // Child went away; its stdout will tell us how.
                        control_open = false;
                    }
                }
                None => control_open = false,
            },
            line = lines.next_line() => match line {
                Ok(Some(line)) => match wire::decode(&line) {
                    Ok(WireMessage { target: Target::Orchestrator, payload }) => match payload {
                        WirePayload::Done => break Ok(()),
                        WirePayload::Error { error } => {
                            break Err(JobError::WorkerFault {
                                message: error.message,
                                trace: error.trace,
                            });
                        }
                        other => {
                            if let Some(event) = other.into_lifecycle() {
                                let _ = events.send(event).await;
                            }
                        }
                    },
                    // Not addressed to us; skip.
                    Ok(_) => {}
                    Err(err) => {
                        eprintln!("Worker {id} sent an undecodable line: {err}");
                    }
                },
                // Protocol violation: the worker exited without __done/__error.
                Ok(None) => break Err(JobError::Terminated),
                Err(err) => break Err(JobError::Io(err)),
            },
        }
    };

    // Teardown is idempotent: the worker normally exited on its own after
    // the terminal message, and kill_on_drop backstops early returns.
    let _ = child.start_kill();
    let _ = child.wait().await;

    outcome
}

async fn send_line(stdin: &mut ChildStdin, payload: WirePayload) -> Result<(), JobError> {
    let mut line = wire::encode(&WireMessage::new(payload))?;
    line.push('\n');
    stdin.write_all(line.as_bytes()).await?;
    stdin.flush().await?;
    Ok(())
}
