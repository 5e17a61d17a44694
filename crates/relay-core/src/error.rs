use thiserror::Error;

use crate::backend::BackendError;
use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("worker registration failed: {0}")]
    Registration(#[source] BackendError),

    #[error("worker unregistration failed: {0}")]
    Unregistration(#[source] BackendError),

    #[error("queue poll failed: {0}")]
    Queue(#[source] BackendError),

    #[error("cannot signal job {phase} for '{job_id}': {source}")]
    Signal {
        phase: &'static str,
        job_id: String,
        #[source]
        source: BackendError,
    },
}
