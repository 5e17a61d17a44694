//! The built-in `subprocess` job.
//!
//! Runs one external program inside the scratch directory:
//!
//! 1. every `inputs` entry is downloaded into the scratch directory;
//! 2. the program runs as the leader of a new process group with the configured
//!    `job_limits`, its output going to `stdout.log` and `stderr.log`;
//! 3. after a zero exit every `outputs` entry is uploaded.
//!
//! The program's exit code becomes `return_code` (`128 + signal` when it was killed).
//! A failed transfer yields [`RETURN_CODE_TRANSFER_FAILED`], a program that could not
//! be started [`RETURN_CODE_SPAWN_FAILED`]; both carry an `error` field.
mod job;
mod spec;

pub use job::SubprocessJob;
pub use spec::{Input, Output, SubprocessSpec};

use std::sync::Arc;

use relay_core::{
    config::ConfigStore,
    job::{Job, JobError, JobRegistry},
    registry::RegistryError,
};
use relay_model::JobDescription;

pub const SUBPROCESS_JOB_TYPE: &str = "subprocess";

pub const STDOUT_LOG: &str = "stdout.log";
pub const STDERR_LOG: &str = "stderr.log";

pub const RETURN_CODE_TRANSFER_FAILED: i32 = 1;
pub const RETURN_CODE_SPAWN_FAILED: i32 = 127;

/// Register the `subprocess` job type.
pub fn register_subprocess_job(jobs: &mut JobRegistry) -> Result<(), RegistryError> {
    jobs.register_fn(SUBPROCESS_JOB_TYPE, create)
}

fn create(description: &JobDescription, config: &Arc<ConfigStore>) -> Result<Arc<dyn Job>, JobError> {
    let spec: SubprocessSpec = description.decode_payload()?;
    spec.validate()?;

    let limits = config.get(|c| c.settings().job_limits.clone()).unwrap_or_default();
    crate::limits::validate(&limits)?;

    let job: Arc<dyn Job> = Arc::new(SubprocessJob::new(spec, limits));
    Ok(job)
}
