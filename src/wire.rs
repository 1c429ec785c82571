//! Wire protocol between the orchestrator and an isolated worker.
//!
//! One newline-delimited JSON [`WireMessage`] per line, over the worker's
//! stdin (orchestrator → worker) and stdout (worker → orchestrator). The
//! payload is a closed enum so both sides match every message kind
//! exhaustively; `target` is carried explicitly and each side ignores lines
//! not addressed to it.

use serde::{Deserialize, Serialize};

use crate::error::JobError;
use crate::events::{ControlEvent, LifecycleEvent};
use crate::state_machine::{JobId, JobInput};

/// Which side of the process boundary a message is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    Orchestrator,
    Worker,
}

/// Error payload carried by a terminal `__error` message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<String>,
}

impl From<&JobError> for WireError {
    fn from(err: &JobError) -> Self {
        Self {
            message: err.to_string(),
            trace: None,
        }
    }
}

/// Every message kind that crosses the process boundary.
///
/// `__start`, `__done` and `__error` are protocol-private: `__start` boots
/// the worker's job, and exactly one of `__done`/`__error` terminates the
/// exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum WirePayload {
    #[serde(rename = "__start")]
    Start { id: JobId, input: JobInput },
    Abort { id: JobId },
    Data { id: JobId, datum: String },
    Status { id: JobId, message: String },
    RequestStart { id: JobId },
    RequestEnd { id: JobId },
    #[serde(rename = "__done")]
    Done,
    #[serde(rename = "__error")]
    Error { error: WireError },
}

impl WirePayload {
    /// The side this payload is meant for.
    pub fn target(&self) -> Target {
        match self {
            WirePayload::Start { .. } | WirePayload::Abort { .. } | WirePayload::Data { .. } => {
                Target::Worker
            }
            WirePayload::Status { .. }
            | WirePayload::RequestStart { .. }
            | WirePayload::RequestEnd { .. }
            | WirePayload::Done
            | WirePayload::Error { .. } => Target::Orchestrator,
        }
    }

    /// Reinterpret an orchestrator-bound payload as the lifecycle event it
    /// mirrors. Terminal and worker-bound payloads yield `None`.
    pub fn into_lifecycle(self) -> Option<LifecycleEvent> {
        match self {
            WirePayload::Status { id, message } => Some(LifecycleEvent::Status { id, message }),
            WirePayload::RequestStart { id } => Some(LifecycleEvent::RequestStart { id }),
            WirePayload::RequestEnd { id } => Some(LifecycleEvent::RequestEnd { id }),
            _ => None,
        }
    }
}

impl From<ControlEvent> for WirePayload {
    fn from(event: ControlEvent) -> Self {
        match event {
            ControlEvent::Abort { id } => WirePayload::Abort { id },
            ControlEvent::Data { id, datum } => WirePayload::Data { id, datum },
        }
    }
}

impl From<LifecycleEvent> for WirePayload {
    fn from(event: LifecycleEvent) -> Self {
        match event {
            LifecycleEvent::Status { id, message } => WirePayload::Status { id, message },
            LifecycleEvent::RequestStart { id } => WirePayload::RequestStart { id },
            LifecycleEvent::RequestEnd { id } => WirePayload::RequestEnd { id },
        }
    }
}

/// The full envelope written to the channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireMessage {
    pub target: Target,
    #[serde(flatten)]
    pub payload: WirePayload,
}

impl WireMessage {
    /// Wrap a payload with its implied target.
    pub fn new(payload: WirePayload) -> Self {
        Self {
            target: payload.target(),
            payload,
        }
    }
}

/// Serialize a message to a single protocol line (no trailing newline).
pub fn encode(message: &WireMessage) -> Result<String, serde_json::Error> {
    serde_json::to_string(message)
}

/// Parse one protocol line.
pub fn decode(line: &str) -> Result<WireMessage, serde_json::Error> {
    serde_json::from_str(line)
}
