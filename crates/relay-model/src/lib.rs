mod domain;
pub use domain::{BackendKind, DeliveryToken, Env, EnvVar, JobId, WorkerId};

mod error;
pub use error::{ModelError, ModelResult};

mod job;
pub use job::{CompletionReport, JobDescription, JobResult};
pub use job::{RETURN_CODE_INTERNAL_FAULT, RETURN_CODE_SUCCESS, RETURN_CODE_TERMINATED};

mod settings;
pub use settings::{BackendOptions, DurationParts, DurationSetting, JobLimits, WorkerSettings};
pub use settings::{MANDATORY_SETTINGS, SETTINGS};
