#![allow(dead_code)]

use std::{
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use relay_core::backend::memory::{MemoryHeartbeater, MemoryQueue};
use relay_core::prelude::*;
use relay_model::{
    BackendOptions, CompletionReport, DurationSetting, JobDescription, JobId, JobResult, WorkerId,
    WorkerSettings,
};

/// Settings with every cadence shrunk to milliseconds.
pub fn fast_settings(tmp_dir: &Path) -> WorkerSettings {
    let mut s = WorkerSettings::new(
        "memory",
        "memory",
        "memory",
        "memory",
        DurationSetting::from_millis(50),
    );
    s.sleep_interval = DurationSetting::from_millis(10);
    s.idle_timeout = DurationSetting::from_millis(20);
    s.tmp_dir = tmp_dir.to_path_buf();
    s
}

pub fn store_with(settings: WorkerSettings, backends: BackendRegistry) -> Arc<ConfigStore> {
    Arc::new(ConfigStore::from_settings(settings, Arc::new(backends)).unwrap())
}

pub fn memory_backends() -> BackendRegistry {
    BackendRegistry::with_memory_backends().unwrap()
}

/// Replace the `memory` heartbeater with one that always hands out `hb`.
pub fn share_heartbeater(backends: &mut BackendRegistry, hb: Arc<dyn Heartbeater>) {
    backends.heartbeaters_mut().unregister("memory");
    backends
        .heartbeaters_mut()
        .register_fn("memory", move |_opts, _prev| Ok(hb.clone()))
        .unwrap();
}

/// Replace the `memory` queue with one that always hands out `queue`.
pub fn share_queue(backends: &mut BackendRegistry, queue: Arc<MemoryQueue>) {
    backends.queues_mut().unregister("memory");
    backends
        .queues_mut()
        .register_fn("memory", move |_opts, _prev| {
            let q: Arc<dyn Queue> = queue.clone();
            Ok(q)
        })
        .unwrap();
}

pub async fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while !cond() {
        assert!(tokio::time::Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

pub fn register_job<J>(jobs: &mut JobRegistry, job_type: &str, job: Arc<J>)
where
    J: Job + 'static,
{
    jobs.register_fn(job_type, move |_d, _c| {
        let job: Arc<dyn Job> = job.clone();
        Ok(job)
    })
    .unwrap();
}

/// Returns immediately with `return_code: 0` and `result_key: builds/<commit>.jar`.
pub struct BuildJob;

#[async_trait]
impl Job for BuildJob {
    fn name(&self) -> &str {
        "build"
    }

    async fn run(&self, ctx: JobContext) -> Result<JobResult, JobError> {
        let commit = ctx
            .description()
            .field("commit")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string();
        Ok(JobResult::success().with_field("result_key", format!("builds/{commit}.jar")))
    }

    fn terminate(&self) {}
}

/// Never returns on its own; counts termination requests.
#[derive(Default)]
pub struct StuckJob {
    pub terminations: AtomicUsize,
}

impl StuckJob {
    pub fn terminations(&self) -> usize {
        self.terminations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Job for StuckJob {
    fn name(&self) -> &str {
        "stuck"
    }

    async fn run(&self, _ctx: JobContext) -> Result<JobResult, JobError> {
        std::future::pending::<()>().await;
        unreachable!()
    }

    fn terminate(&self) {
        self.terminations.fetch_add(1, Ordering::SeqCst);
    }
}

/// Honors cancellation, but only after `linger`.
pub struct SlowToStopJob {
    pub linger: Duration,
    pub terminations: AtomicUsize,
}

impl SlowToStopJob {
    pub fn new(linger: Duration) -> Self {
        Self {
            linger,
            terminations: AtomicUsize::new(0),
        }
    }

    pub fn terminations(&self) -> usize {
        self.terminations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Job for SlowToStopJob {
    fn name(&self) -> &str {
        "slow"
    }

    async fn run(&self, ctx: JobContext) -> Result<JobResult, JobError> {
        ctx.cancel_token().cancelled().await;
        tokio::time::sleep(self.linger).await;
        Ok(JobResult::with_return_code(130).with_field("stopped", true))
    }

    fn terminate(&self) {
        self.terminations.fetch_add(1, Ordering::SeqCst);
    }
}

/// Memory heartbeater with switchable failures.
pub struct FlakyHeartbeater {
    pub inner: MemoryHeartbeater,
    pub fail_register: bool,
    pub fail_heartbeat: bool,
    pub fail_start: bool,
    pub heartbeat_attempts: AtomicUsize,
    pub unregister_calls: AtomicUsize,
}

impl FlakyHeartbeater {
    pub fn new(fail_register: bool, fail_heartbeat: bool) -> Self {
        Self {
            inner: MemoryHeartbeater::default(),
            fail_register,
            fail_heartbeat,
            fail_start: false,
            heartbeat_attempts: AtomicUsize::new(0),
            unregister_calls: AtomicUsize::new(0),
        }
    }

    pub fn failing_start() -> Self {
        Self {
            fail_start: true,
            ..Self::new(false, false)
        }
    }
}

#[async_trait]
impl Heartbeater for FlakyHeartbeater {
    fn name(&self) -> &'static str {
        "flaky"
    }

    fn worker_id(&self) -> Option<WorkerId> {
        self.inner.worker_id()
    }

    async fn register(&self) -> Result<WorkerId, BackendError> {
        if self.fail_register {
            return Err(BackendError::Transport("connection refused".into()));
        }
        self.inner.register().await
    }

    async fn heartbeat(&self, job: Option<&JobId>) -> Result<(), BackendError> {
        self.heartbeat_attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_heartbeat {
            return Err(BackendError::Transport("503 service unavailable".into()));
        }
        self.inner.heartbeat(job).await
    }

    async fn signal_start(&self, job: &JobId) -> Result<(), BackendError> {
        if self.fail_start {
            return Err(BackendError::Transport("502 bad gateway".into()));
        }
        self.inner.signal_start(job).await
    }

    async fn signal_completion(
        &self,
        job: &JobId,
        report: &CompletionReport,
    ) -> Result<(), BackendError> {
        self.inner.signal_completion(job, report).await
    }

    async fn unregister(&self) -> Result<(), BackendError> {
        self.unregister_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.unregister().await
    }
}

/// Every poll fails.
#[derive(Default)]
pub struct BrokenQueue {
    pub polls: AtomicUsize,
}

#[async_trait]
impl Queue for BrokenQueue {
    fn name(&self) -> &'static str {
        "broken"
    }

    async fn poll(&self, _idle: Duration) -> Result<Option<JobDescription>, BackendError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        Err(BackendError::Transport("queue service unreachable".into()))
    }
}

/// Replace the `memory` queue with one whose every poll fails.
pub fn break_queue(backends: &mut BackendRegistry, queue: Arc<BrokenQueue>) {
    backends.queues_mut().unregister("memory");
    backends
        .queues_mut()
        .register_fn("memory", move |_opts, _prev| {
            let q: Arc<dyn Queue> = queue.clone();
            Ok(q)
        })
        .unwrap();
}

pub fn preload(settings: &mut WorkerSettings, jobs: serde_json::Value) {
    settings.queue_options = BackendOptions::new().with("jobs", jobs);
}

pub fn description(job_type: &str) -> JobDescription {
    JobDescription::new(job_type)
}
