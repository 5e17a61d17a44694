use std::{
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

use relay_model::JobDescription;
use tokio_util::sync::CancellationToken;

use crate::backend::{Downloader, Uploader};
use crate::config::ConfigStore;
use crate::process::ProcessGroup;

/// Everything a running job gets from the runner.
#[derive(Clone)]
pub struct JobContext {
    description: Arc<JobDescription>,
    config: Arc<ConfigStore>,
    workdir: PathBuf,
    cancel: CancellationToken,
    group: ProcessGroup,
}

impl JobContext {
    pub fn new(
        description: Arc<JobDescription>,
        config: Arc<ConfigStore>,
        workdir: PathBuf,
        cancel: CancellationToken,
        group: ProcessGroup,
    ) -> Self {
        Self {
            description,
            config,
            workdir,
            cancel,
            group,
        }
    }

    pub fn description(&self) -> &JobDescription {
        &self.description
    }

    pub fn config(&self) -> &Arc<ConfigStore> {
        &self.config
    }

    /// Scratch directory owned by this execution.
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Cancelled when termination of the job is requested.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Process group subprocesses must be spawned into.
    pub fn process_group(&self) -> &ProcessGroup {
        &self.group
    }

    /// Uploader of the current configuration; fetched on every call so reloads are seen.
    pub fn uploader(&self) -> Arc<dyn Uploader> {
        self.config.uploader()
    }

    /// Downloader of the current configuration; fetched on every call so reloads are seen.
    pub fn downloader(&self) -> Arc<dyn Downloader> {
        self.config.downloader()
    }
}

impl fmt::Debug for JobContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobContext")
            .field("job_type", &self.description.job_type())
            .field("workdir", &self.workdir)
            .field("cancelled", &self.cancel.is_cancelled())
            .field("pgid", &self.group.id())
            .finish()
    }
}
