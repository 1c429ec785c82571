use thiserror::Error;

/// Top-level errors surfaced at the binary boundary.
#[derive(Debug, Error)]
pub enum MaestroError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Job error: {0}")]
    Job(#[from] JobError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Terminal failure of a single job. Always caught at the per-job boundary;
/// one job failing never affects its siblings or the orchestrator itself.
#[derive(Debug, Error)]
pub enum JobError {
    /// The job reached ERROR through its own state machine (fail flag).
    #[error("job execution failed")]
    ExecutionFailed,

    /// STAGE2 polled for data past its configured bound.
    #[error("no datum delivered after {polls} polls at STAGE2")]
    DataStarved { polls: u32 },

    /// An isolated worker reported an uncaught fault.
    #[error("worker fault: {message}")]
    WorkerFault {
        message: String,
        trace: Option<String>,
    },

    /// A worker exited (or the job task was dropped) without ever sending
    /// a completion signal.
    #[error("worker terminated without a completion signal")]
    Terminated,

    #[error("worker io: {0}")]
    Io(#[from] std::io::Error),

    #[error("worker codec: {0}")]
    Codec(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_error_messages() {
        assert_eq!(JobError::ExecutionFailed.to_string(), "job execution failed");
        assert_eq!(
            JobError::DataStarved { polls: 60 }.to_string(),
            "no datum delivered after 60 polls at STAGE2"
        );
        assert_eq!(
            JobError::WorkerFault {
                message: "boom".into(),
                trace: None
            }
            .to_string(),
            "worker fault: boom"
        );
    }

    #[test]
    fn maestro_error_wraps_job_error() {
        let err = MaestroError::from(JobError::Terminated);
        assert!(err.to_string().contains("completion signal"));
    }
}
