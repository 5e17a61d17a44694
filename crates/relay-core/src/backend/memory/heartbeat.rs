use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use relay_model::{CompletionReport, JobId, WorkerId};
use tracing::debug;

use crate::backend::{BackendError, Heartbeater, WorkerSlot};

/// Worker id handed out by [`MemoryHeartbeater`] unless configured otherwise.
pub const DEFAULT_MEMORY_WORKER_ID: WorkerId = WorkerId::new(1234);

/// One call observed by a [`MemoryHeartbeater`].
#[derive(Debug, Clone, PartialEq)]
pub enum HeartbeatEvent {
    Register(WorkerId),
    Heartbeat(Option<JobId>),
    Start(JobId),
    Completion(JobId, CompletionReport),
    Unregister(WorkerId),
}

/// Heartbeater that talks to nobody and records every call.
#[derive(Debug)]
pub struct MemoryHeartbeater {
    assign: WorkerId,
    slot: WorkerSlot,
    journal: Mutex<Vec<HeartbeatEvent>>,
}

impl MemoryHeartbeater {
    pub const NAME: &'static str = "memory";

    /// A heartbeater that registers as `assign`.
    pub fn new(assign: WorkerId) -> Self {
        Self {
            assign,
            slot: WorkerSlot::default(),
            journal: Mutex::new(Vec::new()),
        }
    }

    /// Start out already registered as `id`.
    pub fn registered_as(mut self, id: WorkerId) -> Self {
        self.slot = WorkerSlot::new(Some(id));
        self
    }

    /// Copy of the calls recorded so far.
    pub fn events(&self) -> Vec<HeartbeatEvent> {
        self.journal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record(&self, event: HeartbeatEvent) {
        debug!(?event, "memory heartbeater");
        self.journal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

impl Default for MemoryHeartbeater {
    fn default() -> Self {
        Self::new(DEFAULT_MEMORY_WORKER_ID)
    }
}

#[async_trait]
impl Heartbeater for MemoryHeartbeater {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn worker_id(&self) -> Option<WorkerId> {
        self.slot.get()
    }

    async fn register(&self) -> Result<WorkerId, BackendError> {
        self.slot.ensure_vacant()?;
        self.slot.set(self.assign);
        self.record(HeartbeatEvent::Register(self.assign));
        Ok(self.assign)
    }

    async fn heartbeat(&self, job: Option<&JobId>) -> Result<(), BackendError> {
        self.slot.require()?;
        self.record(HeartbeatEvent::Heartbeat(job.cloned()));
        Ok(())
    }

    async fn signal_start(&self, job: &JobId) -> Result<(), BackendError> {
        self.slot.require()?;
        self.record(HeartbeatEvent::Start(job.clone()));
        Ok(())
    }

    async fn signal_completion(
        &self,
        job: &JobId,
        report: &CompletionReport,
    ) -> Result<(), BackendError> {
        self.slot.require()?;
        self.record(HeartbeatEvent::Completion(job.clone(), report.clone()));
        Ok(())
    }

    async fn unregister(&self) -> Result<(), BackendError> {
        let id = self.slot.require()?;
        self.slot.clear();
        self.record(HeartbeatEvent::Unregister(id));
        Ok(())
    }
}
