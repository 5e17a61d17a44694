//! Queue over a spool directory of message files.
//!
//! Every `*.yaml`, `*.yml` or `*.json` file in the directory is one message. Messages
//! are taken oldest first and removed when taken, so a message is delivered at most
//! once even with several workers sharing the directory. Hidden files are skipped,
//! letting producers write `.name.yaml` and rename it into place.
//!
//! A message is a job description plus a `version` field; messages with any other
//! version than the configured one, or that do not parse, are discarded. The file stem
//! becomes the delivery token.
//!
//! Options: `directory` (required, created if missing), `message_version` (default 2),
//! `scan_interval_ms` (default 250).
use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, SystemTime},
};

use async_trait::async_trait;
use relay_core::backend::{BackendError, Queue};
use relay_model::{BackendOptions, DeliveryToken, JobDescription};
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::TransportError;

const EXTENSIONS: [&str; 3] = ["yaml", "yml", "json"];

#[derive(Debug, Clone)]
pub struct SpoolQueue {
    dir: PathBuf,
    version: u64,
    scan_interval: Duration,
}

impl SpoolQueue {
    pub const NAME: &'static str = "spool";
    pub const DEFAULT_MESSAGE_VERSION: u64 = 2;
    pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_millis(250);

    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            version: Self::DEFAULT_MESSAGE_VERSION,
            scan_interval: Self::DEFAULT_SCAN_INTERVAL,
        }
    }

    pub fn with_message_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    pub fn with_scan_interval(mut self, interval: Duration) -> Self {
        self.scan_interval = interval;
        self
    }

    pub fn directory(&self) -> &Path {
        &self.dir
    }

    /// Message files, oldest first.
    async fn pending(&self) -> Result<Vec<PathBuf>, TransportError> {
        let file_error = |source| TransportError::File {
            path: self.dir.clone(),
            source,
        };
        let mut entries = tokio::fs::read_dir(&self.dir).await.map_err(file_error)?;

        let mut found = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(file_error)? {
            let path = entry.path();
            if !is_message(&path) {
                continue;
            }
            let Ok(meta) = entry.metadata().await else {
                continue;
            };
            if meta.is_file() {
                found.push((meta.modified().unwrap_or(SystemTime::UNIX_EPOCH), path));
            }
        }
        found.sort();
        Ok(found.into_iter().map(|(_, path)| path).collect())
    }

    /// Read and remove one message file.
    ///
    /// `None` when another consumer removed it first or the message was discarded. The
    /// unlink is synchronous and nothing is awaited after it, so a dropped `poll` either
    /// left the file in place or has already returned its description.
    async fn take(&self, path: &Path) -> Result<Option<JobDescription>, TransportError> {
        let file_error = |source| TransportError::File {
            path: path.to_path_buf(),
            source,
        };
        let text = match tokio::fs::read_to_string(path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(file_error(e)),
        };
        match std::fs::remove_file(path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(file_error(e)),
        }

        match self.decode(path, &text) {
            Ok(description) => Ok(Some(description)),
            Err(reason) => {
                warn!(path = %path.display(), %reason, "discarded spool message");
                Ok(None)
            }
        }
    }

    fn decode(&self, path: &Path, text: &str) -> Result<JobDescription, String> {
        let mut doc: Value = serde_yaml_bw::from_str(text).map_err(|e| e.to_string())?;
        let fields = doc.as_object_mut().ok_or("message is not a mapping")?;
        match fields.remove("version").as_ref().and_then(Value::as_u64) {
            Some(v) if v == self.version => {}
            Some(v) => return Err(format!("unsupported message version {v}")),
            None => return Err("message has no numeric version".into()),
        }

        let mut description: JobDescription =
            serde_json::from_value(doc).map_err(|e| e.to_string())?;
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        description.secret_key = Some(DeliveryToken::new(stem));
        Ok(description)
    }
}

#[async_trait]
impl Queue for SpoolQueue {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn poll(&self, idle: Duration) -> Result<Option<JobDescription>, BackendError> {
        let deadline = Instant::now() + idle;
        loop {
            for path in self.pending().await? {
                if let Some(description) = self.take(&path).await? {
                    debug!(path = %path.display(), "took spool message");
                    return Ok(Some(description));
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(self.scan_interval.min(deadline - now)).await;
        }
    }
}

fn is_message(path: &Path) -> bool {
    let hidden = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_none_or(|n| n.starts_with('.'));
    let known = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| EXTENSIONS.contains(&e));
    !hidden && known
}

pub(crate) fn create(
    opts: &BackendOptions,
    _previous: Option<&Arc<dyn Queue>>,
) -> Result<Arc<dyn Queue>, BackendError> {
    let dir = opts.require_path("directory")?;
    std::fs::create_dir_all(&dir)?;

    let mut queue = SpoolQueue::new(dir);
    if let Some(version) = opts.get_u64("message_version")? {
        queue = queue.with_message_version(version);
    }
    if let Some(ms) = opts.get_u64("scan_interval_ms")? {
        queue = queue.with_scan_interval(Duration::from_millis(ms));
    }
    let queue: Arc<dyn Queue> = Arc::new(queue);
    Ok(queue)
}
