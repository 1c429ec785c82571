mod job;
mod runner;
mod state;

pub use job::{IdGenerator, JobId, JobInput, RunnerConfig, UuidIds};
pub use runner::JobRunner;
pub use state::JobState;
