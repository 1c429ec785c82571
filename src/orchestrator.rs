//! Job registry, lifecycle bookkeeping, and event wiring.
//!
//! One [`Orchestrator`] drives any number of concurrent jobs through an
//! injected [`ExecutionBackend`] — in-process tasks or isolated worker
//! processes — with identical semantics. Submission is fire-and-forget:
//! nothing throttles the fan-out, and one job failing never touches its
//! siblings.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::backend::ExecutionBackend;
use crate::error::JobError;
use crate::events::{ControlEvent, LifecycleEvent};
use crate::router::EventRouter;
use crate::state_machine::{IdGenerator, JobId, JobInput, UuidIds};

const LIFECYCLE_CAPACITY: usize = 64;

/// Tally of jobs currently inside a data-collection window. Only the
/// zero/non-zero edges are externally meaningful.
#[derive(Default)]
pub struct CollectionSession {
    collecting: HashSet<JobId>,
}

impl CollectionSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a job as collecting. Returns `None` if it already was, otherwise
    /// whether this was the 0→1 edge.
    pub fn begin(&mut self, id: JobId) -> Option<bool> {
        if !self.collecting.insert(id) {
            return None;
        }
        Some(self.collecting.len() == 1)
    }

    /// Clear a job's collecting mark. Returns `None` if it was not marked,
    /// otherwise whether this was the 1→0 edge.
    pub fn end(&mut self, id: JobId) -> Option<bool> {
        if !self.collecting.remove(&id) {
            return None;
        }
        Some(self.collecting.is_empty())
    }

    pub fn active(&self) -> usize {
        self.collecting.len()
    }
}

/// Handle returned by [`Orchestrator::submit`]. Await [`JobHandle::wait`]
/// for the job's terminal outcome; dropping the handle detaches the job
/// without cancelling it.
pub struct JobHandle {
    id: JobId,
    done: oneshot::Receiver<Result<(), JobError>>,
}

impl JobHandle {
    pub fn id(&self) -> JobId {
        self.id
    }

    pub async fn wait(self) -> Result<(), JobError> {
        self.done.await.unwrap_or(Err(JobError::Terminated))
    }
}

struct Inner<B> {
    backend: B,
    router: EventRouter,
    ids: Box<dyn IdGenerator>,
    session: Mutex<CollectionSession>,
}

pub struct Orchestrator<B: ExecutionBackend> {
    inner: Arc<Inner<B>>,
}

impl<B: ExecutionBackend> Clone for Orchestrator<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B: ExecutionBackend> Orchestrator<B> {
    pub fn new(backend: B) -> Self {
        Self::with_ids(backend, Box::new(UuidIds))
    }

    /// Construct with an injected identifier capability.
    pub fn with_ids(backend: B, ids: Box<dyn IdGenerator>) -> Self {
        Self {
            inner: Arc::new(Inner {
                backend,
                router: EventRouter::new(),
                ids,
                session: Mutex::new(CollectionSession::new()),
            }),
        }
    }

    /// Jobs currently registered.
    pub fn active_jobs(&self) -> usize {
        self.inner.router.active()
    }

    /// Jobs currently inside a collection window.
    pub fn collecting(&self) -> usize {
        self.inner.session.lock().expect("session lock poisoned").active()
    }

    /// Publish an abort addressed to one job. Returns whether the job was
    /// still registered to receive it.
    pub async fn abort(&self, id: JobId) -> bool {
        self.inner.router.publish(ControlEvent::Abort { id }).await
    }

    /// Start a job. Allocates a fresh unique id, wires the job's event
    /// channels, and runs it concurrently with every other active job.
    pub fn submit(&self, input: JobInput) -> JobHandle {
        let inner = Arc::clone(&self.inner);

        // Retry generation until the id is absent from the registry;
        // register() is the atomic uniqueness check.
        let (id, control) = loop {
            let id = inner.ids.generate();
            if let Some(rx) = inner.router.register(id) {
                break (id, rx);
            }
        };

        let (ev_tx, ev_rx) = mpsc::channel(LIFECYCLE_CAPACITY);
        let (done_tx, done_rx) = oneshot::channel();

        tokio::spawn(async move {
            println!("Job {id} starting");
            let (outcome, ()) = tokio::join!(
                inner.backend.run_job(id, input, control, ev_tx),
                inner.observe(ev_rx),
            );

            // Per-job failures are logged here and surfaced only through the
            // handle; they are never fatal to the orchestrator.
            match &outcome {
                Ok(()) => println!("Job {id} finished without errors"),
                Err(err) => eprintln!("Job {id} finished with error: {err}"),
            }

            inner.teardown(id);
            let _ = done_tx.send(outcome);
        });

        JobHandle { id, done: done_rx }
    }
}

impl<B> Inner<B> {
    /// Consume one job's lifecycle events until its channel closes.
    async fn observe(&self, mut events: mpsc::Receiver<LifecycleEvent>) {
        while let Some(event) = events.recv().await {
            match event {
                LifecycleEvent::Status { id, message } => {
                    println!("Job {id} posted status: {message}");
                }
                LifecycleEvent::RequestStart { id } => self.handle_request_start(id).await,
                LifecycleEvent::RequestEnd { id } => self.handle_request_end(id),
            }
        }
    }

    async fn handle_request_start(&self, id: JobId) {
        let edge = {
            let mut session = self.session.lock().expect("session lock poisoned");
            session.begin(id)
        };
        // Duplicate announcements get no second datum.
        let Some(first) = edge else { return };

        println!("Job {id} starting data request...");
        if first {
            println!("Collecting enabled...");
        }

        // Fresh datum standing in for an asynchronous external data source.
        let datum = Uuid::new_v4().to_string();
        let _ = self.router.publish(ControlEvent::Data { id, datum }).await;
    }

    fn handle_request_end(&self, id: JobId) {
        let edge = {
            let mut session = self.session.lock().expect("session lock poisoned");
            session.end(id)
        };
        if let Some(last) = edge {
            println!("Job {id} ending data request...");
            if last {
                println!("Collecting disabled...");
            }
        }
    }

    /// Remove all per-job wiring. Also clears a collecting mark the job never
    /// released itself, e.g. a worker that died mid-collection.
    fn teardown(&self, id: JobId) {
        self.router.unregister(id);
        self.handle_request_end(id);
    }
}
