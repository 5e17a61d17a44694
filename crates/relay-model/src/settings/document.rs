use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{BackendKind, BackendOptions, DurationSetting, ModelError};

/// Every key a worker settings document may contain.
pub const SETTINGS: &[&str] = &[
    "access_key_id",
    "secret_access_key",
    "queue_type",
    "queue_options",
    "uploader_type",
    "uploader_options",
    "downloader_type",
    "downloader_options",
    "heartbeater_type",
    "heartbeater_options",
    "worker_timeout",
    "heartbeat_period",
    "sleep_interval",
    "idle_timeout",
    "tmp_dir",
    "job_limits",
];

/// Keys that must be present; every other key has a default.
pub const MANDATORY_SETTINGS: &[&str] = &[
    "queue_type",
    "uploader_type",
    "downloader_type",
    "heartbeater_type",
    "heartbeat_period",
];

const DEFAULT_WORKER_TIMEOUT: DurationSetting = DurationSetting::from_secs(48 * 60 * 60);
const DEFAULT_SLEEP_INTERVAL: DurationSetting = DurationSetting::from_secs(15);
const DEFAULT_IDLE_TIMEOUT: DurationSetting = DurationSetting::from_secs(2 * 60);
const DEFAULT_TMP_DIR: &str = "/tmp";

/// POSIX resource limits applied to job subprocesses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobLimits {
    /// `RLIMIT_NOFILE`.
    #[serde(default)]
    pub max_open_files: Option<u64>,
    /// `RLIMIT_FSIZE`.
    #[serde(default)]
    pub max_file_size_bytes: Option<u64>,
    /// `RLIMIT_CORE = 0` when set.
    #[serde(default)]
    pub disable_core_dumps: bool,
}

impl JobLimits {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.max_open_files.is_none() && self.max_file_size_bytes.is_none() && !self.disable_core_dumps
    }
}

/// Validated worker settings document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkerSettings {
    #[serde(default)]
    pub access_key_id: Option<String>,
    #[serde(default)]
    pub secret_access_key: Option<String>,

    pub queue_type: String,
    #[serde(default)]
    pub queue_options: BackendOptions,

    pub uploader_type: String,
    #[serde(default)]
    pub uploader_options: BackendOptions,

    pub downloader_type: String,
    #[serde(default)]
    pub downloader_options: BackendOptions,

    pub heartbeater_type: String,
    #[serde(default)]
    pub heartbeater_options: BackendOptions,

    /// Max wall-clock duration of one job.
    #[serde(default = "default_worker_timeout")]
    pub worker_timeout: DurationSetting,
    pub heartbeat_period: DurationSetting,
    /// Supervision tick while a job is running.
    #[serde(default = "default_sleep_interval")]
    pub sleep_interval: DurationSetting,
    /// Upper bound of one blocking queue poll.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout: DurationSetting,

    /// Root of per-job scratch directories.
    #[serde(default = "default_tmp_dir")]
    pub tmp_dir: PathBuf,

    #[serde(default)]
    pub job_limits: Option<JobLimits>,
}

fn default_worker_timeout() -> DurationSetting {
    DEFAULT_WORKER_TIMEOUT
}

fn default_sleep_interval() -> DurationSetting {
    DEFAULT_SLEEP_INTERVAL
}

fn default_idle_timeout() -> DurationSetting {
    DEFAULT_IDLE_TIMEOUT
}

fn default_tmp_dir() -> PathBuf {
    PathBuf::from(DEFAULT_TMP_DIR)
}

impl WorkerSettings {
    /// Minimal settings selecting the given backend identifiers; everything else defaults.
    pub fn new(
        queue_type: impl Into<String>,
        uploader_type: impl Into<String>,
        downloader_type: impl Into<String>,
        heartbeater_type: impl Into<String>,
        heartbeat_period: DurationSetting,
    ) -> Self {
        Self {
            access_key_id: None,
            secret_access_key: None,
            queue_type: queue_type.into(),
            queue_options: BackendOptions::default(),
            uploader_type: uploader_type.into(),
            uploader_options: BackendOptions::default(),
            downloader_type: downloader_type.into(),
            downloader_options: BackendOptions::default(),
            heartbeater_type: heartbeater_type.into(),
            heartbeater_options: BackendOptions::default(),
            worker_timeout: DEFAULT_WORKER_TIMEOUT,
            heartbeat_period,
            sleep_interval: DEFAULT_SLEEP_INTERVAL,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            tmp_dir: default_tmp_dir(),
            job_limits: None,
        }
    }

    /// Validate and decode a parsed settings document.
    ///
    /// Rules, in order:
    /// - the document is a mapping;
    /// - every key is one of [`SETTINGS`];
    /// - every key in [`MANDATORY_SETTINGS`] is present;
    /// - values decode into their typed form;
    /// - `heartbeat_period` and `sleep_interval` are non-zero.
    pub fn from_document(doc: Value) -> Result<Self, ModelError> {
        let Value::Object(map) = &doc else {
            return Err(ModelError::InvalidSettings(
                "settings document must be a mapping".into(),
            ));
        };
        if let Some(unknown) = map.keys().find(|k| !SETTINGS.contains(&k.as_str())) {
            return Err(ModelError::UnknownSetting(unknown.clone()));
        }
        if let Some(missing) = MANDATORY_SETTINGS.iter().find(|k| !map.contains_key(**k)) {
            return Err(ModelError::MissingSetting((*missing).to_string()));
        }

        let settings: WorkerSettings = serde_json::from_value(doc)
            .map_err(|e| ModelError::InvalidSettings(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check value-level invariants.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.heartbeat_period.as_duration().is_zero() {
            return Err(ModelError::InvalidDuration {
                key: "heartbeat_period",
                reason: "must be greater than zero".into(),
            });
        }
        if self.sleep_interval.as_duration().is_zero() {
            return Err(ModelError::InvalidDuration {
                key: "sleep_interval",
                reason: "must be greater than zero".into(),
            });
        }
        Ok(())
    }

    /// Backend identifier configured for a role.
    pub fn backend_type(&self, kind: BackendKind) -> &str {
        match kind {
            BackendKind::Queue => &self.queue_type,
            BackendKind::Uploader => &self.uploader_type,
            BackendKind::Downloader => &self.downloader_type,
            BackendKind::Heartbeater => &self.heartbeater_type,
        }
    }

    /// Options for a role with the worker credentials merged in.
    ///
    /// Explicit per-backend values are kept.
    pub fn backend_options(&self, kind: BackendKind) -> BackendOptions {
        let mut opts = match kind {
            BackendKind::Queue => self.queue_options.clone(),
            BackendKind::Uploader => self.uploader_options.clone(),
            BackendKind::Downloader => self.downloader_options.clone(),
            BackendKind::Heartbeater => self.heartbeater_options.clone(),
        };
        if let Some(id) = &self.access_key_id {
            opts.insert_if_absent("access_key_id", id.as_str());
        }
        if let Some(secret) = &self.secret_access_key {
            opts.insert_if_absent("secret_access_key", secret.as_str());
        }
        opts
    }

    #[inline]
    pub fn worker_timeout(&self) -> Duration {
        self.worker_timeout.as_duration()
    }

    #[inline]
    pub fn heartbeat_period(&self) -> Duration {
        self.heartbeat_period.as_duration()
    }

    #[inline]
    pub fn sleep_interval(&self) -> Duration {
        self.sleep_interval.as_duration()
    }

    #[inline]
    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout.as_duration()
    }
}
