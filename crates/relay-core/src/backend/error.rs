use thiserror::Error;

use relay_model::{ModelError, WorkerId};

use crate::registry::RegistryError;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("backend options: {0}")]
    Options(#[from] ModelError),

    #[error("worker already registered as {0}")]
    AlreadyRegistered(WorkerId),

    #[error("worker not registered")]
    NotRegistered,

    #[error("object '{0}' not found")]
    NotFound(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected response: {0}")]
    Protocol(String),
}
