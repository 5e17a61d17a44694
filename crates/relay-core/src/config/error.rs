use std::path::PathBuf;

use relay_model::{BackendKind, ModelError};
use thiserror::Error;

use crate::backend::BackendError;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read configuration '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse configuration: {0}")]
    Parse(String),

    #[error(transparent)]
    Settings(#[from] ModelError),

    #[error("cannot build {kind} backend '{id}': {source}")]
    Backend {
        kind: BackendKind,
        id: String,
        #[source]
        source: BackendError,
    },

    #[error("configuration was not loaded from a file; nothing to reload")]
    NoSource,
}
