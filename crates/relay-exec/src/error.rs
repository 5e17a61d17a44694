use relay_core::job::JobError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("invalid subprocess payload: {0}")]
    InvalidSpec(String),

    #[error("invalid job limits: {0}")]
    InvalidLimits(String),
}

impl From<ExecError> for JobError {
    fn from(e: ExecError) -> Self {
        JobError::Failed(e.to_string())
    }
}
