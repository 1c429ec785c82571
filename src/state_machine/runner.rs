use tokio::sync::mpsc;
use tokio::time::sleep;

use crate::error::JobError;
use crate::events::{ControlEvent, LifecycleEvent};

use super::job::{JobId, JobInput, RunnerConfig};
use super::state::JobState;

/// Drives one job through its state machine.
///
/// The runner owns its private datum buffer and abort flag; the only way in
/// is the control channel, the only way out is the lifecycle channel. It
/// never emits control events.
pub struct JobRunner {
    id: JobId,
    input: JobInput,
    config: RunnerConfig,
    state: JobState,
    buffer: Vec<String>,
    aborted: bool,
    stage2_polls: u32,
    failure: Option<JobError>,
    events: mpsc::Sender<LifecycleEvent>,
    control: mpsc::Receiver<ControlEvent>,
}

impl JobRunner {
    pub fn new(
        id: JobId,
        input: JobInput,
        config: RunnerConfig,
        events: mpsc::Sender<LifecycleEvent>,
        control: mpsc::Receiver<ControlEvent>,
    ) -> Self {
        Self {
            id,
            input,
            config,
            state: JobState::Initialized,
            buffer: Vec::new(),
            aborted: false,
            stage2_polls: 0,
            failure: None,
            events,
            control,
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    /// Whether an abort addressed to this job was observed. Recorded only;
    /// no transition acts on it.
    pub fn aborted(&self) -> bool {
        self.aborted
    }

    /// Run the state machine to a terminal state.
    ///
    /// Emits a `Status` event for every state entered (including STAGE2
    /// self-loops). Returns `Ok` on END; on ERROR emits one final
    /// `RequestEnd` as idempotent cleanup and fails.
    pub async fn start(&mut self) -> Result<(), JobError> {
        self.state = JobState::Started;
        self.emit_state().await;

        while !self.state.is_terminal() {
            self.state = self.step().await;
            self.emit_state().await;
        }

        if self.state == JobState::Errored {
            self.emit(LifecycleEvent::RequestEnd { id: self.id }).await;
            return Err(self.failure.take().unwrap_or(JobError::ExecutionFailed));
        }
        Ok(())
    }

    /// One transition: simulated work delay, inbound control drain, then the
    /// state-specific logic.
    async fn step(&mut self) -> JobState {
        sleep(self.config.work_delay).await;
        self.drain_control();

        match self.state {
            JobState::Started => JobState::Stage1,
            JobState::Stage1 => {
                self.emit(LifecycleEvent::RequestStart { id: self.id }).await;
                JobState::Stage2
            }
            JobState::Stage2 => match self.buffer.pop() {
                Some(datum) => {
                    self.emit_status(format!("Received datum: {datum}")).await;
                    self.emit(LifecycleEvent::RequestEnd { id: self.id }).await;
                    JobState::Stage3
                }
                None => {
                    self.stage2_polls += 1;
                    if self.stage2_polls >= self.config.stage2_max_polls {
                        self.failure = Some(JobError::DataStarved {
                            polls: self.stage2_polls,
                        });
                        JobState::Errored
                    } else {
                        JobState::Stage2
                    }
                }
            },
            JobState::Stage3 => {
                if self.input.fail {
                    JobState::Errored
                } else {
                    JobState::Ended
                }
            }
            // Defensive default for unrecognized positions.
            JobState::Initialized | JobState::Ended | JobState::Errored => JobState::Errored,
        }
    }

    /// Apply every control event queued since the last step.
    fn drain_control(&mut self) {
        while let Ok(event) = self.control.try_recv() {
            self.handle_control(event);
        }
    }

    /// Inbound hook for a single control event. The router already routes by
    /// address, but the id is re-checked so a misrouted event can never
    /// mutate this job.
    fn handle_control(&mut self, event: ControlEvent) {
        match event {
            ControlEvent::Abort { id } if id == self.id => self.aborted = true,
            ControlEvent::Data { id, datum } if id == self.id => self.buffer.push(datum),
            ControlEvent::Abort { .. } | ControlEvent::Data { .. } => {}
        }
    }

    async fn emit_state(&mut self) {
        self.emit_status(format!("State Update: {}", self.state)).await;
    }

    async fn emit_status(&mut self, message: String) {
        self.emit(LifecycleEvent::Status {
            id: self.id,
            message,
        })
        .await;
    }

    async fn emit(&mut self, event: LifecycleEvent) {
        // The observer side may already be gone during teardown.
        let _ = self.events.send(event).await;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn test_config() -> RunnerConfig {
        RunnerConfig {
            work_delay: Duration::from_millis(5),
            stage2_max_polls: 50,
        }
    }

    fn make_runner(
        id: JobId,
        input: JobInput,
        config: RunnerConfig,
    ) -> (
        JobRunner,
        mpsc::Receiver<LifecycleEvent>,
        mpsc::Sender<ControlEvent>,
    ) {
        let (ev_tx, ev_rx) = mpsc::channel(128);
        let (ctl_tx, ctl_rx) = mpsc::channel(128);
        (
            JobRunner::new(id, input, config, ev_tx, ctl_rx),
            ev_rx,
            ctl_tx,
        )
    }

    fn drain_events(rx: &mut mpsc::Receiver<LifecycleEvent>) -> Vec<LifecycleEvent> {
        let mut events = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            events.push(ev);
        }
        events
    }

    fn status_messages(events: &[LifecycleEvent]) -> Vec<String> {
        events
            .iter()
            .filter_map(|ev| match ev {
                LifecycleEvent::Status { message, .. } => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn happy_path_walks_all_states() {
        let id = JobId::from_u128(1);
        let (mut runner, mut ev_rx, ctl_tx) = make_runner(id, JobInput::new("data0", false), test_config());

        // Satisfy the data request as soon as it is announced.
        let feeder = tokio::spawn(async move {
            ctl_tx
                .send(ControlEvent::Data {
                    id,
                    datum: "d-0".into(),
                })
                .await
                .unwrap();
        });

        runner.start().await.unwrap();
        feeder.await.unwrap();
        assert_eq!(runner.state(), JobState::Ended);

        let events = drain_events(&mut ev_rx);
        let statuses = status_messages(&events);
        assert_eq!(statuses.first().unwrap(), "State Update: STARTED");
        assert_eq!(statuses.last().unwrap(), "State Update: END");
        assert!(statuses.contains(&"Received datum: d-0".to_string()));

        let starts = events
            .iter()
            .filter(|ev| matches!(ev, LifecycleEvent::RequestStart { .. }))
            .count();
        let ends = events
            .iter()
            .filter(|ev| matches!(ev, LifecycleEvent::RequestEnd { .. }))
            .count();
        assert_eq!(starts, 1);
        assert_eq!(ends, 1);
    }

    #[tokio::test]
    async fn fail_flag_errors_at_stage3() {
        let id = JobId::from_u128(2);
        let (mut runner, mut ev_rx, ctl_tx) = make_runner(id, JobInput::new("data1", true), test_config());

        ctl_tx
            .send(ControlEvent::Data {
                id,
                datum: "d-1".into(),
            })
            .await
            .unwrap();

        let err = runner.start().await.unwrap_err();
        assert!(matches!(err, JobError::ExecutionFailed));
        assert_eq!(runner.state(), JobState::Errored);

        // The cleanup RequestEnd trails the ERROR status update.
        let events = drain_events(&mut ev_rx);
        let error_pos = events
            .iter()
            .position(|ev| matches!(ev, LifecycleEvent::Status { message, .. } if message == "State Update: ERROR"))
            .unwrap();
        let trailing_ends = events[error_pos..]
            .iter()
            .filter(|ev| matches!(ev, LifecycleEvent::RequestEnd { .. }))
            .count();
        assert_eq!(trailing_ends, 1);
    }

    #[tokio::test]
    async fn datum_buffer_pops_last_in_first_out() {
        let id = JobId::from_u128(3);
        let (mut runner, mut ev_rx, ctl_tx) = make_runner(id, JobInput::new("data2", false), test_config());

        // Both queued before the runner reaches STAGE2.
        for datum in ["first", "second"] {
            ctl_tx
                .send(ControlEvent::Data {
                    id,
                    datum: datum.into(),
                })
                .await
                .unwrap();
        }

        runner.start().await.unwrap();
        let statuses = status_messages(&drain_events(&mut ev_rx));
        assert!(statuses.contains(&"Received datum: second".to_string()));
        assert!(!statuses.contains(&"Received datum: first".to_string()));
    }

    #[tokio::test]
    async fn starvation_bound_errors_distinctly() {
        let id = JobId::from_u128(4);
        let config = RunnerConfig {
            work_delay: Duration::from_millis(2),
            stage2_max_polls: 3,
        };
        let (mut runner, mut ev_rx, _ctl_tx) = make_runner(id, JobInput::new("data3", false), config);

        let err = runner.start().await.unwrap_err();
        assert!(matches!(err, JobError::DataStarved { polls: 3 }));
        assert_eq!(runner.state(), JobState::Errored);

        // Cleanup still announced so the orchestrator can release the session.
        let events = drain_events(&mut ev_rx);
        assert!(
            events
                .iter()
                .any(|ev| matches!(ev, LifecycleEvent::RequestEnd { .. }))
        );
    }

    #[tokio::test]
    async fn abort_sets_flag_without_stopping_the_run() {
        let id = JobId::from_u128(5);
        let (mut runner, _ev_rx, ctl_tx) = make_runner(id, JobInput::new("data4", false), test_config());

        ctl_tx.send(ControlEvent::Abort { id }).await.unwrap();
        ctl_tx
            .send(ControlEvent::Data {
                id,
                datum: "d".into(),
            })
            .await
            .unwrap();

        runner.start().await.unwrap();
        assert!(runner.aborted());
        assert_eq!(runner.state(), JobState::Ended);
    }

    #[tokio::test]
    async fn control_events_for_other_jobs_are_ignored() {
        let id = JobId::from_u128(6);
        let stranger = JobId::from_u128(7);
        let config = RunnerConfig {
            work_delay: Duration::from_millis(2),
            stage2_max_polls: 3,
        };
        let (mut runner, _ev_rx, ctl_tx) = make_runner(id, JobInput::new("data5", false), config);

        ctl_tx.send(ControlEvent::Abort { id: stranger }).await.unwrap();
        ctl_tx
            .send(ControlEvent::Data {
                id: stranger,
                datum: "not-yours".into(),
            })
            .await
            .unwrap();

        // The misaddressed datum must not satisfy STAGE2.
        let err = runner.start().await.unwrap_err();
        assert!(matches!(err, JobError::DataStarved { .. }));
        assert!(!runner.aborted());
    }
}
