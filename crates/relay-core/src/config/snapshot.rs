use std::{fmt, sync::Arc};

use relay_model::WorkerSettings;

use crate::backend::{Downloader, Heartbeater, Queue, Uploader};

/// One immutable, versioned configuration: validated settings plus the backend
/// handles built from them.
pub struct Configuration {
    pub(crate) version: u64,
    pub(crate) settings: WorkerSettings,
    pub(crate) queue: Arc<dyn Queue>,
    pub(crate) uploader: Arc<dyn Uploader>,
    pub(crate) downloader: Arc<dyn Downloader>,
    pub(crate) heartbeater: Arc<dyn Heartbeater>,
}

impl Configuration {
    /// 1 for the initial load, bumped by every successful reload.
    #[inline]
    pub fn version(&self) -> u64 {
        self.version
    }

    #[inline]
    pub fn settings(&self) -> &WorkerSettings {
        &self.settings
    }

    pub fn queue(&self) -> &Arc<dyn Queue> {
        &self.queue
    }

    pub fn uploader(&self) -> &Arc<dyn Uploader> {
        &self.uploader
    }

    pub fn downloader(&self) -> &Arc<dyn Downloader> {
        &self.downloader
    }

    pub fn heartbeater(&self) -> &Arc<dyn Heartbeater> {
        &self.heartbeater
    }
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configuration")
            .field("version", &self.version)
            .field("queue", &self.queue.name())
            .field("uploader", &self.uploader.name())
            .field("downloader", &self.downloader.name())
            .field("heartbeater", &self.heartbeater.name())
            .field("worker_timeout", &self.settings.worker_timeout())
            .field("heartbeat_period", &self.settings.heartbeat_period())
            .field("sleep_interval", &self.settings.sleep_interval())
            .field("idle_timeout", &self.settings.idle_timeout())
            .field("tmp_dir", &self.settings.tmp_dir)
            .finish()
    }
}
