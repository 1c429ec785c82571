use std::fmt;

use serde::{Deserialize, Serialize};

/// The seven states of the job state machine.
///
/// Each job flows through:
/// STARTED → STAGE1 → STAGE2 (self-loops until a datum arrives) → STAGE3 → END,
/// with ERROR as the terminal failure state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Initialized,
    Started,
    Stage1,
    Stage2,
    Stage3,
    Ended,
    Errored,
}

impl JobState {
    /// Whether the state machine stops here.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Ended | JobState::Errored)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Initialized => write!(f, "INITIALIZED"),
            JobState::Started => write!(f, "STARTED"),
            JobState::Stage1 => write!(f, "STAGE1"),
            JobState::Stage2 => write!(f, "STAGE2"),
            JobState::Stage3 => write!(f, "STAGE3"),
            JobState::Ended => write!(f, "END"),
            JobState::Errored => write!(f, "ERROR"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_display() {
        assert_eq!(JobState::Initialized.to_string(), "INITIALIZED");
        assert_eq!(JobState::Started.to_string(), "STARTED");
        assert_eq!(JobState::Stage1.to_string(), "STAGE1");
        assert_eq!(JobState::Stage2.to_string(), "STAGE2");
        assert_eq!(JobState::Stage3.to_string(), "STAGE3");
        assert_eq!(JobState::Ended.to_string(), "END");
        assert_eq!(JobState::Errored.to_string(), "ERROR");
    }

    #[test]
    fn only_end_and_error_are_terminal() {
        assert!(JobState::Ended.is_terminal());
        assert!(JobState::Errored.is_terminal());
        assert!(!JobState::Initialized.is_terminal());
        assert!(!JobState::Started.is_terminal());
        assert!(!JobState::Stage2.is_terminal());
    }

    #[test]
    fn state_serialization_roundtrip() {
        let json = serde_json::to_string(&JobState::Stage2).unwrap();
        let back: JobState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, JobState::Stage2);
    }
}
