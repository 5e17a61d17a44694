use std::path::PathBuf;

use relay_core::backend::BackendError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} answered {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("base url {0} cannot carry a path")]
    BaseUrl(String),

    #[error("object key '{0}' is not a relative path inside the storage root")]
    Key(String),

    #[error("register response did not contain a worker_id")]
    MissingWorkerId,

    #[error("cannot determine hostname: {0}")]
    Hostname(std::io::Error),

    #[error("{}: {source}", path.display())]
    File {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl From<TransportError> for BackendError {
    fn from(e: TransportError) -> Self {
        match &e {
            TransportError::MissingWorkerId => BackendError::Protocol(e.to_string()),
            TransportError::File { source, .. } if source.kind() == std::io::ErrorKind::NotFound => {
                BackendError::NotFound(e.to_string())
            }
            _ => BackendError::Transport(e.to_string()),
        }
    }
}
