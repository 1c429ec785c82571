use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque addressing key for a single job. Every targeted event carries one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(Uuid);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl JobId {
    #[cfg(test)]
    pub fn from_u128(v: u128) -> Self {
        JobId(Uuid::from_u128(v))
    }
}

/// Produces fresh job identifiers. The orchestrator retries generation until
/// the value is absent from the active registry, so implementations only need
/// to be collision-unlikely, not collision-free.
pub trait IdGenerator: Send + Sync {
    fn generate(&self) -> JobId;
}

/// Default generator backed by random v4 UUIDs.
pub struct UuidIds;

impl IdGenerator for UuidIds {
    fn generate(&self) -> JobId {
        JobId(Uuid::new_v4())
    }
}

/// One unit of work handed to the orchestrator.
///
/// `fail` deterministically forces the job into its error state at STAGE3,
/// modeling a dependency failure discovered only after most work is done.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobInput {
    pub payload: String,
    pub fail: bool,
}

impl JobInput {
    pub fn new(payload: impl Into<String>, fail: bool) -> Self {
        Self {
            payload: payload.into(),
            fail,
        }
    }
}

/// Timing knobs for a [`JobRunner`](super::JobRunner).
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Simulated work delay between state transitions.
    pub work_delay: Duration,
    /// Upper bound on STAGE2 self-loops before the job fails with
    /// a data-starvation error.
    pub stage2_max_polls: u32,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            work_delay: Duration::from_millis(500),
            stage2_max_polls: 60,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_distinct() {
        let ids = UuidIds;
        assert_ne!(ids.generate(), ids.generate());
    }

    #[test]
    fn job_id_serializes_as_uuid_string() {
        let id = JobId::from_u128(7);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"00000000-0000-0000-0000-000000000007\"");
        let back: JobId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn job_input_roundtrip() {
        let input = JobInput::new("data0", true);
        let json = serde_json::to_string(&input).unwrap();
        let back: JobInput = serde_json::from_str(&json).unwrap();
        assert_eq!(back.payload, "data0");
        assert!(back.fail);
    }

    #[test]
    fn runner_config_defaults() {
        let cfg = RunnerConfig::default();
        assert_eq!(cfg.work_delay, Duration::from_millis(500));
        assert_eq!(cfg.stage2_max_polls, 60);
    }
}
