mod duration;
pub use duration::{DurationParts, DurationSetting};

mod options;
pub use options::BackendOptions;

mod document;
pub use document::{JobLimits, MANDATORY_SETTINGS, SETTINGS, WorkerSettings};
