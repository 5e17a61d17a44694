//! Top-level control loop.
//!
//! ```text
//! Unregistered -> Registering -> Supervising -> Unregistering -> Terminated
//!                      |                                            ^
//!                      +---------------- register failed -----------+
//! ```
//!
//! While supervising, the manager alternates between a bounded queue poll and, once a
//! job arrives, a fixed-cadence supervision loop over a fresh [`Runner`]. Heartbeats,
//! reloads, the job timeout and termination requests are checked between ticks only.
mod control;
pub use control::{ControlHandle, ShutdownLevel};

mod state;
pub use state::ManagerState;

use std::{sync::Arc, time::Duration};

use relay_model::{CompletionReport, JobDescription, JobId};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::ConfigStore;
use crate::error::CoreError;
use crate::job::JobRegistry;
use crate::runner::{DEFAULT_TERMINATION_GRACE, Runner};

pub struct Manager {
    config: Arc<ConfigStore>,
    jobs: Arc<JobRegistry>,
    control: ControlHandle,
    state: ManagerState,
    grace: Duration,
    last_heartbeat: Option<Instant>,
}

impl Manager {
    pub fn new(config: Arc<ConfigStore>, jobs: Arc<JobRegistry>) -> Self {
        Self {
            config,
            jobs,
            control: ControlHandle::new(),
            state: ManagerState::Unregistered,
            grace: DEFAULT_TERMINATION_GRACE,
            last_heartbeat: None,
        }
    }

    /// Grace period handed to every runner.
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Handle for signal handlers and tests.
    pub fn control(&self) -> ControlHandle {
        self.control.clone()
    }

    #[inline]
    pub fn state(&self) -> ManagerState {
        self.state
    }

    /// Register, supervise until drained, unregister.
    ///
    /// A registration failure is returned without unregistering. A supervising fault is
    /// logged, unregistration still runs, and the fault is returned.
    pub async fn run(&mut self) -> Result<(), CoreError> {
        self.transition(ManagerState::Registering);
        let worker_id = match self.config.heartbeater().register().await {
            Ok(id) => id,
            Err(e) => {
                error!(error = %e, "registration failed");
                self.transition(ManagerState::Terminated);
                return Err(CoreError::Registration(e));
            }
        };
        info!(%worker_id, "worker registered");

        self.transition(ManagerState::Supervising);
        let supervised = self.supervise().await;
        if let Err(e) = &supervised {
            error!(error = %e, "supervising loop failed");
        }

        self.transition(ManagerState::Unregistering);
        let unregistered = self.config.heartbeater().unregister().await;
        match &unregistered {
            Ok(()) => info!(%worker_id, "worker unregistered"),
            Err(e) => error!(%worker_id, error = %e, "unregistration failed"),
        }
        self.transition(ManagerState::Terminated);

        supervised?;
        unregistered.map_err(CoreError::Unregistration)
    }

    async fn supervise(&mut self) -> Result<(), CoreError> {
        let drain = self.control.drain_token();
        loop {
            if self.control.level() >= ShutdownLevel::Draining {
                info!("draining; leaving the poll loop");
                return Ok(());
            }
            self.reload_if_requested().await;

            let idle = self.config.get(|c| c.settings().idle_timeout());
            let queue = self.config.queue();
            let polled = tokio::select! {
                res = queue.poll(idle) => res.map_err(CoreError::Queue)?,
                _ = drain.cancelled() => None,
            };

            match polled {
                Some(description) => self.dispatch(description).await?,
                None => self.heartbeat_if_due(None).await,
            }
        }
    }

    async fn dispatch(&mut self, description: JobDescription) -> Result<(), CoreError> {
        let job_id = description.effective_job_id();
        let secret_key = description.secret_key.clone();
        let job_type = description.job_type().unwrap_or("<none>").to_string();
        let job_label = job_id.as_ref().map(JobId::as_str).unwrap_or("<none>").to_string();
        info!(job_id = %job_label, job_type = %job_type, "job received");

        // A stop request made while idle does not carry over to this job.
        if self.control.take_job_termination() {
            debug!(job_id = %job_label, "discarding job termination requested while idle");
        }

        match &job_id {
            Some(id) => self
                .config
                .heartbeater()
                .signal_start(id)
                .await
                .map_err(|source| CoreError::Signal {
                    phase: "start",
                    job_id: id.to_string(),
                    source,
                })?,
            None => warn!(job_type = %job_type, "job has neither job_id nor delivery token; not signalling"),
        }

        let started_at = OffsetDateTime::now_utc();
        let started = Instant::now();
        let mut runner = Runner::new(self.jobs.clone(), self.config.clone()).with_grace(self.grace);
        runner.run(description);
        if self.control.level() >= ShutdownLevel::ForceTerminate {
            warn!(job_id = %job_label, "forced shutdown in progress; terminating the job");
            runner.terminate();
        }

        let mut timed_out = false;
        while runner.running() {
            self.heartbeat_if_due(job_id.as_ref()).await;
            self.reload_if_requested().await;

            let (timeout, tick) = self.config.get(|c| {
                (
                    c.settings().worker_timeout(),
                    c.settings().sleep_interval(),
                )
            });
            if !timed_out && started.elapsed() >= timeout {
                timed_out = true;
                warn!(job_id = %job_label, ?timeout, "job exceeded worker_timeout; terminating");
                runner.terminate();
            }
            if self.control.take_job_termination() {
                warn!(job_id = %job_label, "job termination requested");
                runner.terminate();
            }

            tokio::time::sleep(tick).await;
        }

        let result = match runner.join().await {
            Some(result) => result.clone(),
            None => relay_model::JobResult::errored("runner produced no result"),
        };
        let runtime = started.elapsed().as_secs_f64();
        let started_at = started_at
            .format(&Rfc3339)
            .unwrap_or_else(|_| started_at.unix_timestamp().to_string());
        let report = CompletionReport::new(result, secret_key.as_ref(), started_at, runtime);

        info!(
            job_id = %job_label,
            return_code = ?report.return_code(),
            runtime_seconds = runtime,
            "job completed"
        );

        if let Some(id) = &job_id {
            self.config
                .heartbeater()
                .signal_completion(id, &report)
                .await
                .map_err(|source| CoreError::Signal {
                    phase: "completion",
                    job_id: id.to_string(),
                    source,
                })?;
        }
        Ok(())
    }

    /// Heartbeat failures are logged and swallowed.
    async fn heartbeat_if_due(&mut self, job: Option<&JobId>) {
        let period = self.config.get(|c| c.settings().heartbeat_period());
        if self.last_heartbeat.is_some_and(|at| at.elapsed() < period) {
            return;
        }
        self.last_heartbeat = Some(Instant::now());

        match self.config.heartbeater().heartbeat(job).await {
            Ok(()) => debug!(job_id = ?job.map(JobId::as_str), "heartbeat sent"),
            Err(e) => warn!(error = %e, "heartbeat failed"),
        }
    }

    /// File reads and backend construction run on the blocking pool.
    async fn reload_if_requested(&self) {
        if !self.control.take_reload() {
            return;
        }
        let config = self.config.clone();
        match tokio::task::spawn_blocking(move || config.reload()).await {
            Ok(Ok(version)) => info!(version, "configuration reloaded on request"),
            Ok(Err(e)) => warn!(
                error = %e,
                version = self.config.version(),
                "configuration reload failed; keeping current configuration"
            ),
            Err(e) => error!(error = %e, "configuration reload task failed"),
        }
    }

    fn transition(&mut self, next: ManagerState) {
        debug_assert!(next != self.state, "manager state did not change");
        info!(from = %self.state, to = %next, "manager state");
        self.state = next;
    }
}

impl std::fmt::Debug for Manager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manager")
            .field("state", &self.state)
            .field("level", &self.control.level())
            .field("grace", &self.grace)
            .finish()
    }
}
