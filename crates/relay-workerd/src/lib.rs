//! Daemon wiring: registries, configuration, signals and exit codes.
mod args;
pub use args::Args;

pub mod signals;

use std::{path::Path, sync::Arc};

use anyhow::Context;
use relay_core::prelude::*;
use relay_exec::register_subprocess_job;
use relay_transport::register_transport_backends;
use tracing::info;

/// Clean shutdown after a full unregister.
pub const EXIT_OK: u8 = 0;
/// Startup, registration or supervising failure.
pub const EXIT_FAILURE: u8 = 1;
/// Third termination request; the process stops without unregistering.
pub const EXIT_FORCED: u8 = 130;

/// Every backend this binary ships with.
pub fn backend_registry() -> Result<BackendRegistry, RegistryError> {
    let mut reg = BackendRegistry::with_memory_backends()?;
    register_transport_backends(&mut reg)?;
    Ok(reg)
}

/// Every job type this binary ships with.
pub fn job_registry() -> Result<JobRegistry, RegistryError> {
    let mut jobs = JobRegistry::new();
    register_subprocess_job(&mut jobs)?;
    Ok(jobs)
}

/// Load the configuration at `config_path` and run the manager until it is drained.
pub async fn run(config_path: &Path) -> anyhow::Result<()> {
    let backends = Arc::new(backend_registry().context("building backend registry")?);
    let jobs = Arc::new(job_registry().context("building job registry")?);

    let config = ConfigStore::load(config_path, backends)
        .with_context(|| format!("loading configuration from {}", config_path.display()))?;
    info!(
        path = %config_path.display(),
        version = config.version(),
        "configuration loaded"
    );

    let mut manager = Manager::new(Arc::new(config), jobs);
    let listener = signals::install(manager.control()).context("installing signal handlers")?;

    let result = manager.run().await;
    listener.abort();
    result.context("worker stopped with an error")
}
