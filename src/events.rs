//! Typed events exchanged between jobs and the orchestrator.
//!
//! Jobs emit [`LifecycleEvent`]s describing their own progress; the
//! orchestrator emits [`ControlEvent`]s addressed to exactly one job.
//! Both are closed enums so every consumer matches exhaustively.

use serde::{Deserialize, Serialize};

use crate::state_machine::JobId;

/// Emitted by a job, observed by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleEvent {
    /// Free-form progress message.
    Status { id: JobId, message: String },
    /// The job entered its data-collection phase and needs data delivered.
    RequestStart { id: JobId },
    /// The job no longer needs data delivery.
    RequestEnd { id: JobId },
}

impl LifecycleEvent {
    pub fn job_id(&self) -> JobId {
        match self {
            LifecycleEvent::Status { id, .. }
            | LifecycleEvent::RequestStart { id }
            | LifecycleEvent::RequestEnd { id } => *id,
        }
    }
}

/// Emitted by the orchestrator, consumed by the addressed job only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlEvent {
    /// Request the job to stop. Currently recorded by the runner as an
    /// inert flag; no transition acts on it.
    Abort { id: JobId },
    /// Deliver one datum into the job's private buffer.
    Data { id: JobId, datum: String },
}

impl ControlEvent {
    pub fn job_id(&self) -> JobId {
        match self {
            ControlEvent::Abort { id } | ControlEvent::Data { id, .. } => *id,
        }
    }
}
