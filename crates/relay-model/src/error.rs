use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("unknown setting '{0}'")]
    UnknownSetting(String),

    #[error("mandatory setting '{0}' is missing")]
    MissingSetting(String),

    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    #[error("invalid duration for '{key}': {reason}")]
    InvalidDuration { key: &'static str, reason: String },

    #[error("missing option: {0}")]
    MissingOption(String),

    #[error("invalid option '{key}': {reason}")]
    InvalidOption { key: String, reason: String },

    #[error("invalid job payload: {0}")]
    InvalidPayload(String),
}

pub type ModelResult<T> = Result<T, ModelError>;
