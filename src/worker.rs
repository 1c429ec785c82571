//! Worker-process bootstrap.
//!
//! Runs inside the isolated process spawned by
//! [`ProcessBackend`](crate::backend::ProcessBackend). Waits for the
//! `__start` handshake on stdin, hosts exactly one [`JobRunner`], relays
//! wire messages to and from it, and reports a single terminal `__done` or
//! `__error`. Stdout belongs to the protocol; all logging goes to stderr.

use std::backtrace::Backtrace;
use std::sync::Once;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

use crate::error::MaestroError;
use crate::events::{ControlEvent, LifecycleEvent};
use crate::state_machine::{JobRunner, RunnerConfig};
use crate::wire::{self, Target, WireError, WireMessage, WirePayload};

const CHANNEL_CAPACITY: usize = 64;

static FAULT_HOOK: Once = Once::new();
static TERMINAL_SENT: AtomicBool = AtomicBool::new(false);

/// Host one job inside this process. `inject_fault` panics the job task
/// instead of running it, exercising the fault-reporting path end to end.
pub async fn run(config: RunnerConfig, inject_fault: bool) -> Result<(), MaestroError> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    // Startup handshake: nothing happens until __start arrives.
    let (id, input) = loop {
        match lines.next_line().await? {
            Some(line) => match wire::decode(&line) {
                Ok(WireMessage {
                    target: Target::Worker,
                    payload: WirePayload::Start { id, input },
                }) => break (id, input),
                Ok(_) => {}
                Err(err) => eprintln!("Worker skipping undecodable line before __start: {err}"),
            },
            None => {
                return Err(MaestroError::Io(std::io::Error::other(
                    "channel closed before __start",
                )));
            }
        }
    };

    install_fault_handler();

    let (ctl_tx, ctl_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (ev_tx, mut ev_rx) = mpsc::channel::<LifecycleEvent>(CHANNEL_CAPACITY);

    // Inbound pump: worker-targeted abort/data into the runner's hooks.
    let inbound = tokio::spawn(async move {
        while let Ok(Some(line)) = lines.next_line().await {
            match wire::decode(&line) {
                Ok(WireMessage {
                    target: Target::Worker,
                    payload,
                }) => {
                    let event = match payload {
                        WirePayload::Abort { id } => Some(ControlEvent::Abort { id }),
                        WirePayload::Data { id, datum } => Some(ControlEvent::Data { id, datum }),
                        // A second __start is a protocol misuse; drop it.
                        _ => None,
                    };
                    if let Some(event) = event
                        && ctl_tx.send(event).await.is_err()
                    {
                        break;
                    }
                }
                Ok(_) => {}
                Err(err) => eprintln!("Worker skipping undecodable line: {err}"),
            }
        }
    });

    // Outbound pump: lifecycle events mirrored to stdout, in emission order.
    let outbound = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(event) = ev_rx.recv().await {
            let Ok(mut line) = wire::encode(&WireMessage::new(event.into())) else {
                continue;
            };
            line.push('\n');
            if stdout.write_all(line.as_bytes()).await.is_err() {
                break;
            }
            let _ = stdout.flush().await;
        }
    });

    let job = tokio::spawn(async move {
        if inject_fault {
            panic!("injected worker fault");
        }
        let mut runner = JobRunner::new(id, input, config, ev_tx, ctl_rx);
        runner.start().await
    });

    let outcome = job.await;
    // The runner dropped its event sender, so the outbound pump drains fully
    // before the terminal message goes out.
    let _ = outbound.await;
    inbound.abort();

    match outcome {
        Ok(Ok(())) => emit_terminal(WirePayload::Done),
        Ok(Err(err)) => emit_terminal(WirePayload::Error {
            error: WireError::from(&err),
        }),
        // A panic already reached the fault handler; this emit dedups to a
        // no-op unless the hook never managed to write.
        Err(join_err) => emit_terminal(WirePayload::Error {
            error: WireError {
                message: join_err.to_string(),
                trace: None,
            },
        }),
    }

    Ok(())
}

/// Convert any uncaught panic in this process into a terminal `__error`.
/// Installed once; repeated calls are no-ops.
pub fn install_fault_handler() {
    FAULT_HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let message = panic_message(info);
            let trace = Backtrace::force_capture().to_string();
            emit_terminal(WirePayload::Error {
                error: WireError {
                    message,
                    trace: Some(trace),
                },
            });
            previous(info);
        }));
    });
}

fn panic_message(info: &std::panic::PanicHookInfo<'_>) -> String {
    if let Some(s) = info.payload().downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = info.payload().downcast_ref::<String>() {
        s.clone()
    } else {
        "uncaught worker fault".to_string()
    }
}

/// Write a terminal message to stdout. At most one ever leaves the process,
/// whichever path gets here first.
fn emit_terminal(payload: WirePayload) {
    if TERMINAL_SENT.swap(true, Ordering::SeqCst) {
        return;
    }
    if let Ok(line) = wire::encode(&WireMessage::new(payload)) {
        println!("{line}");
        let _ = std::io::Write::flush(&mut std::io::stdout());
    }
}
