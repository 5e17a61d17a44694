//! Executes one job on its own tokio task.
//!
//! Every fault (construction error, `Err` from the job, panic, forced stop) is turned
//! into a plain [`JobResult`] here; nothing job-related escapes to the manager.
mod scratch;

use std::{
    fmt,
    path::PathBuf,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use relay_model::{JobDescription, JobResult, RETURN_CODE_SUCCESS};
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::ConfigStore;
use crate::job::{Job, JobContext, JobRegistry};
use crate::process::ProcessGroup;

/// How long a job may take to answer the first termination request before its process
/// group is killed.
pub const DEFAULT_TERMINATION_GRACE: Duration = Duration::from_secs(10);

/// How a finished run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The job returned `return_code: 0`.
    Success,
    /// The job returned a missing or non-zero code, or was stopped.
    Failed,
    /// The runner had to synthesize the result (construction error, `Err`, panic).
    Errored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    Created,
    Running,
    Finished(Outcome),
}

impl fmt::Display for RunnerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunnerState::Created => f.write_str("created"),
            RunnerState::Running => f.write_str("running"),
            RunnerState::Finished(Outcome::Success) => f.write_str("finished(success)"),
            RunnerState::Finished(Outcome::Failed) => f.write_str("finished(failed)"),
            RunnerState::Finished(Outcome::Errored) => f.write_str("finished(errored)"),
        }
    }
}

struct Finished {
    result: JobResult,
    outcome: Outcome,
}

impl Finished {
    fn returned(result: JobResult) -> Self {
        let outcome = if result.return_code == Some(RETURN_CODE_SUCCESS) {
            Outcome::Success
        } else {
            Outcome::Failed
        };
        Self { result, outcome }
    }

    fn errored(reason: impl Into<String>) -> Self {
        Self {
            result: JobResult::errored(reason),
            outcome: Outcome::Errored,
        }
    }

    fn terminated() -> Self {
        Self {
            result: JobResult::terminated(),
            outcome: Outcome::Failed,
        }
    }
}

/// Handles the runner keeps to reach into a running execution.
struct Control {
    job: Arc<Mutex<Option<Arc<dyn Job>>>>,
    cancel: CancellationToken,
    group: ProcessGroup,
}

/// Runs exactly one job.
///
/// `run` returns immediately; poll [`Runner::running`] or await [`Runner::join`] and only
/// then read [`Runner::result`].
pub struct Runner {
    jobs: Arc<JobRegistry>,
    config: Arc<ConfigStore>,
    grace: Duration,
    state: RunnerState,
    handle: Option<JoinHandle<Finished>>,
    control: Option<Control>,
    terminate_requests: u32,
    result: Option<JobResult>,
}

impl Runner {
    pub fn new(jobs: Arc<JobRegistry>, config: Arc<ConfigStore>) -> Self {
        Self {
            jobs,
            config,
            grace: DEFAULT_TERMINATION_GRACE,
            state: RunnerState::Created,
            handle: None,
            control: None,
            terminate_requests: 0,
            result: None,
        }
    }

    /// Override the termination grace period.
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    #[inline]
    pub fn state(&self) -> RunnerState {
        self.state
    }

    /// Start `description` on a new task. A runner runs at most one job; later calls are
    /// ignored.
    pub fn run(&mut self, description: JobDescription) {
        if self.state != RunnerState::Created {
            warn!(state = %self.state, "runner already used; ignoring run request");
            return;
        }

        let tmp_dir = self.config.get(|c| c.settings().tmp_dir.clone());
        let control = Control {
            job: Arc::new(Mutex::new(None)),
            cancel: CancellationToken::new(),
            group: ProcessGroup::new(),
        };
        let exec = Execution {
            description: Arc::new(description),
            jobs: self.jobs.clone(),
            config: self.config.clone(),
            tmp_dir,
            grace: self.grace,
            job: control.job.clone(),
            cancel: control.cancel.clone(),
            group: control.group.clone(),
        };

        self.handle = Some(tokio::spawn(exec.execute()));
        self.control = Some(control);
        self.state = RunnerState::Running;
    }

    /// `true` while the execution task is alive.
    pub fn running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Ask the job to stop.
    ///
    /// The first call forwards to [`Job::terminate`], cancels the job's token and starts
    /// the grace period. Any later call kills the process group and aborts the task.
    pub fn terminate(&mut self) {
        let (Some(control), Some(handle)) = (&self.control, &self.handle) else {
            debug!("terminate on a runner without a job; ignoring");
            return;
        };

        self.terminate_requests += 1;
        if self.terminate_requests == 1 {
            info!("requesting job termination");
            let job = control
                .job
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone();
            if let Some(job) = job {
                job.terminate();
            }
            control.cancel.cancel();
        } else {
            warn!("forcing job termination");
            if let Err(e) = control.group.kill() {
                warn!(error = %e, "failed to kill job process group");
            }
            handle.abort();
        }
    }

    /// Wait for the execution task to exit and record its result.
    pub async fn join(&mut self) -> Option<&JobResult> {
        if let Some(handle) = self.handle.take() {
            let finished = match handle.await {
                Ok(finished) => finished,
                Err(e) => self.lost(e),
            };
            info!(
                outcome = ?finished.outcome,
                return_code = ?finished.result.return_code,
                "job finished"
            );
            self.state = RunnerState::Finished(finished.outcome);
            self.result = Some(finished.result);
            self.control = None;
        }
        self.result.as_ref()
    }

    /// Result of the run; `None` until [`Runner::join`] completed.
    pub fn result(&self) -> Option<&JobResult> {
        self.result.as_ref()
    }

    fn lost(&self, e: JoinError) -> Finished {
        if e.is_cancelled() {
            warn!("job task aborted");
            return Finished::terminated();
        }
        let reason = panic_message(e);
        error!(reason = %reason, "job panicked; scratch directory kept");
        Finished::errored(format!("job panicked: {reason}"))
    }
}

impl fmt::Debug for Runner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runner")
            .field("state", &self.state)
            .field("grace", &self.grace)
            .field("terminate_requests", &self.terminate_requests)
            .finish()
    }
}

fn panic_message(e: JoinError) -> String {
    match e.try_into_panic() {
        Ok(payload) => payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string()),
        Err(e) => e.to_string(),
    }
}

/// State moved onto the execution task.
struct Execution {
    description: Arc<JobDescription>,
    jobs: Arc<JobRegistry>,
    config: Arc<ConfigStore>,
    tmp_dir: PathBuf,
    grace: Duration,
    job: Arc<Mutex<Option<Arc<dyn Job>>>>,
    cancel: CancellationToken,
    group: ProcessGroup,
}

impl Execution {
    async fn execute(self) -> Finished {
        let job_type = self.description.job_type().unwrap_or("job").to_string();

        let workdir = match scratch::create(&self.tmp_dir, &job_type).await {
            Ok(dir) => dir,
            Err(e) => {
                error!(job_type = %job_type, error = %e, "cannot create scratch directory");
                return Finished::errored(format!("cannot create scratch directory: {e}"));
            }
        };

        let finished = self.supervise(&job_type, workdir.clone()).await;

        if finished.outcome == Outcome::Success {
            scratch::remove(&workdir).await;
        } else {
            info!(
                job_type = %job_type,
                workdir = %workdir.display(),
                "keeping scratch directory of failed job"
            );
        }
        finished
    }

    async fn supervise(&self, job_type: &str, workdir: PathBuf) -> Finished {
        let job = match self.jobs.create(&self.description, &self.config) {
            Ok(job) => job,
            Err(e) => {
                error!(job_type, error = %e, "cannot create job");
                return Finished::errored(e.to_string());
            }
        };
        *self.job.lock().unwrap_or_else(PoisonError::into_inner) = Some(job.clone());

        let ctx = JobContext::new(
            self.description.clone(),
            self.config.clone(),
            workdir,
            self.cancel.clone(),
            self.group.clone(),
        );
        info!(job_type, job = job.name(), "job started");

        let run = job.run(ctx);
        tokio::pin!(run);

        let returned = tokio::select! {
            res = &mut run => res,
            _ = self.cancel.cancelled() => {
                match tokio::time::timeout(self.grace, &mut run).await {
                    Ok(res) => res,
                    Err(_) => {
                        warn!(job_type, grace = ?self.grace, "job ignored termination; killing process group");
                        if let Err(e) = self.group.kill() {
                            warn!(error = %e, "failed to kill job process group");
                        }
                        return Finished::terminated();
                    }
                }
            }
        };

        match returned {
            Ok(result) => Finished::returned(result),
            Err(e) => {
                error!(job_type, error = %e, "job failed with an internal error");
                Finished::errored(e.to_string())
            }
        }
    }
}
