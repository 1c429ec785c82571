//! maestro — concurrent job lifecycle orchestration.
//!
//! A batch of jobs runs under one [`Orchestrator`](orchestrator::Orchestrator),
//! each job driven by its own [`JobRunner`](state_machine::JobRunner) state
//! machine. Two interchangeable [`ExecutionBackend`](backend::ExecutionBackend)s
//! exist: [`InProcessBackend`](backend::InProcessBackend) runs every job as a
//! tokio task sharing the in-memory [`EventRouter`](router::EventRouter);
//! [`ProcessBackend`](backend::ProcessBackend) isolates each job in its own
//! worker process and mirrors the same event semantics over a newline-JSON
//! wire protocol.

pub mod backend;
pub mod cli;
pub mod config;
pub mod error;
pub mod events;
pub mod orchestrator;
pub mod router;
pub mod state_machine;
pub mod ui;
pub mod wire;
pub mod worker;
