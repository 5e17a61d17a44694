use relay_model::ModelError;
use thiserror::Error;

use crate::backend::BackendError;
use crate::registry::RegistryError;

#[derive(Debug, Error)]
pub enum JobError {
    #[error("job description has no job_type")]
    MissingType,

    #[error(transparent)]
    Unknown(#[from] RegistryError),

    #[error(transparent)]
    Payload(#[from] ModelError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("job failed: {0}")]
    Failed(String),
}
