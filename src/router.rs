//! Per-job control-event routing.
//!
//! Replaces a broadcast-and-filter bus with one owned channel per registered
//! job: a published [`ControlEvent`] reaches the addressed job's channel and
//! nothing else, so isolation is enforced here rather than trusted to the
//! jobs. The route map doubles as the active-job registry the orchestrator
//! checks for identifier collisions.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::mpsc;

use crate::events::ControlEvent;
use crate::state_machine::JobId;

const CONTROL_CAPACITY: usize = 64;

#[derive(Default)]
pub struct EventRouter {
    routes: Mutex<HashMap<JobId, mpsc::Sender<ControlEvent>>>,
}

impl EventRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job and hand back its control receiver.
    ///
    /// Returns `None` if the id is already active — insert and collision
    /// check are one atomic step under the lock, so concurrent registrations
    /// can never race a duplicate in.
    pub fn register(&self, id: JobId) -> Option<mpsc::Receiver<ControlEvent>> {
        let mut routes = self.routes.lock().expect("router lock poisoned");
        if routes.contains_key(&id) {
            return None;
        }
        let (tx, rx) = mpsc::channel(CONTROL_CAPACITY);
        routes.insert(id, tx);
        Some(rx)
    }

    /// Drop a job's route. Safe to call for ids that were never registered.
    pub fn unregister(&self, id: JobId) {
        self.routes.lock().expect("router lock poisoned").remove(&id);
    }

    pub fn contains(&self, id: JobId) -> bool {
        self.routes
            .lock()
            .expect("router lock poisoned")
            .contains_key(&id)
    }

    pub fn active(&self) -> usize {
        self.routes.lock().expect("router lock poisoned").len()
    }

    /// Deliver an event to the job it addresses. Returns whether a live
    /// route accepted it; events for unknown or torn-down jobs are dropped.
    pub async fn publish(&self, event: ControlEvent) -> bool {
        let sender = {
            let routes = self.routes.lock().expect("router lock poisoned");
            routes.get(&event.job_id()).cloned()
        };
        match sender {
            Some(tx) => tx.send(event).await.is_ok(),
            None => false,
        }
    }
}
