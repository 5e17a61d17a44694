use std::{
    fmt,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, PoisonError, RwLock},
};

use relay_model::{BackendKind, WorkerSettings};
use serde_json::Value;
use tracing::{debug, info};

use crate::backend::{BackendError, BackendRegistry, Downloader, Heartbeater, Queue, Uploader};
use crate::config::{ConfigError, Configuration};

/// Thread-safe holder of the live [`Configuration`].
///
/// Readers take a point-in-time snapshot (an `Arc` clone) and never hold the lock across
/// I/O. A reload builds the next snapshot off to the side and swaps it in with one write;
/// on any error the current snapshot stays live.
pub struct ConfigStore {
    path: Option<PathBuf>,
    backends: Arc<BackendRegistry>,
    current: RwLock<Arc<Configuration>>,
    reload_lock: Mutex<()>,
}

impl ConfigStore {
    /// Read, validate and build the configuration at `path`.
    pub fn load(path: impl AsRef<Path>, backends: Arc<BackendRegistry>) -> Result<Self, ConfigError> {
        let path = path.as_ref().to_path_buf();
        let settings = read_settings(&path)?;
        let cfg = build(&backends, settings, None, 1)?;
        info!(path = %path.display(), version = cfg.version, "configuration loaded");

        Ok(Self {
            path: Some(path),
            backends,
            current: RwLock::new(Arc::new(cfg)),
            reload_lock: Mutex::new(()),
        })
    }

    /// Build a store from settings that did not come from a file.
    ///
    /// Such a store can be updated with [`ConfigStore::apply`] but not [`ConfigStore::reload`].
    ///
    /// # Examples
    /// ```
    /// use std::sync::Arc;
    /// use relay_core::prelude::*;
    /// use relay_model::{DurationSetting, WorkerSettings};
    ///
    /// let settings = WorkerSettings::new(
    ///     "memory", "memory", "memory", "memory",
    ///     DurationSetting::from_secs(30),
    /// );
    /// let backends = Arc::new(BackendRegistry::with_memory_backends().unwrap());
    /// let store = ConfigStore::from_settings(settings, backends).unwrap();
    ///
    /// assert_eq!(store.version(), 1);
    /// assert_eq!(store.queue().name(), "memory");
    /// assert!(store.reload().is_err());
    /// ```
    pub fn from_settings(
        settings: WorkerSettings,
        backends: Arc<BackendRegistry>,
    ) -> Result<Self, ConfigError> {
        settings.validate()?;
        let cfg = build(&backends, settings, None, 1)?;

        Ok(Self {
            path: None,
            backends,
            current: RwLock::new(Arc::new(cfg)),
            reload_lock: Mutex::new(()),
        })
    }

    /// Source file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Re-read the source file and atomically replace the configuration.
    ///
    /// Returns the new version. On failure the previous configuration and backend
    /// handles stay live.
    pub fn reload(&self) -> Result<u64, ConfigError> {
        let path = self.path.as_deref().ok_or(ConfigError::NoSource)?;
        let _guard = self.reload_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let settings = read_settings(path)?;
        self.swap(settings)
    }

    /// Atomically replace the configuration with `settings`.
    ///
    /// # Examples
    /// ```
    /// use std::{sync::Arc, time::Duration};
    /// use relay_core::prelude::*;
    /// use relay_model::{DurationSetting, WorkerSettings};
    ///
    /// let settings = |secs| {
    ///     WorkerSettings::new("memory", "memory", "memory", "memory", DurationSetting::from_secs(secs))
    /// };
    /// let backends = Arc::new(BackendRegistry::with_memory_backends().unwrap());
    /// let store = ConfigStore::from_settings(settings(30), backends).unwrap();
    ///
    /// assert_eq!(store.apply(settings(60)).unwrap(), 2);
    /// assert_eq!(store.get(|c| c.settings().heartbeat_period()), Duration::from_secs(60));
    /// ```
    pub fn apply(&self, settings: WorkerSettings) -> Result<u64, ConfigError> {
        let _guard = self.reload_lock.lock().unwrap_or_else(PoisonError::into_inner);

        settings.validate()?;
        self.swap(settings)
    }

    // Caller holds `reload_lock`.
    fn swap(&self, settings: WorkerSettings) -> Result<u64, ConfigError> {
        let prev = self.snapshot();
        let next = build(&self.backends, settings, Some(&*prev), prev.version + 1)?;
        let version = next.version;

        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(next);
        info!(version, "configuration reloaded");
        Ok(version)
    }

    /// Current configuration.
    pub fn snapshot(&self) -> Arc<Configuration> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Read any number of fields from one consistent snapshot.
    ///
    /// ```
    /// # use std::{sync::Arc, time::Duration};
    /// # use relay_core::prelude::*;
    /// # use relay_model::{DurationSetting, WorkerSettings};
    /// # let settings =
    /// #     WorkerSettings::new("memory", "memory", "memory", "memory", DurationSetting::from_secs(30));
    /// # let backends = Arc::new(BackendRegistry::with_memory_backends().unwrap());
    /// # let store = ConfigStore::from_settings(settings, backends).unwrap();
    /// let (version, period) = store.get(|c| (c.version(), c.settings().heartbeat_period()));
    /// assert_eq!((version, period), (1, Duration::from_secs(30)));
    /// ```
    pub fn get<R>(&self, f: impl FnOnce(&Configuration) -> R) -> R {
        f(&self.snapshot())
    }

    #[inline]
    pub fn version(&self) -> u64 {
        self.get(|c| c.version)
    }

    pub fn queue(&self) -> Arc<dyn Queue> {
        self.get(|c| c.queue.clone())
    }

    pub fn uploader(&self) -> Arc<dyn Uploader> {
        self.get(|c| c.uploader.clone())
    }

    pub fn downloader(&self) -> Arc<dyn Downloader> {
        self.get(|c| c.downloader.clone())
    }

    pub fn heartbeater(&self) -> Arc<dyn Heartbeater> {
        self.get(|c| c.heartbeater.clone())
    }
}

impl fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigStore")
            .field("path", &self.path)
            .field("current", &self.snapshot())
            .finish()
    }
}

/// Parse a YAML (or JSON) settings document into a generic value tree.
pub fn parse_document(text: &str) -> Result<Value, ConfigError> {
    serde_yaml_bw::from_str::<Value>(text).map_err(|e| ConfigError::Parse(e.to_string()))
}

fn read_settings(path: &Path) -> Result<WorkerSettings, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let doc = parse_document(&text)?;
    Ok(WorkerSettings::from_document(doc)?)
}

fn build(
    backends: &BackendRegistry,
    settings: WorkerSettings,
    prev: Option<&Configuration>,
    version: u64,
) -> Result<Configuration, ConfigError> {
    let queue = backends
        .queues()
        .create(
            &settings.queue_type,
            &settings.backend_options(BackendKind::Queue),
            prev.map(|p| &p.queue),
        )
        .map_err(backend_error(BackendKind::Queue, &settings))?;
    let uploader = backends
        .uploaders()
        .create(
            &settings.uploader_type,
            &settings.backend_options(BackendKind::Uploader),
            prev.map(|p| &p.uploader),
        )
        .map_err(backend_error(BackendKind::Uploader, &settings))?;
    let downloader = backends
        .downloaders()
        .create(
            &settings.downloader_type,
            &settings.backend_options(BackendKind::Downloader),
            prev.map(|p| &p.downloader),
        )
        .map_err(backend_error(BackendKind::Downloader, &settings))?;
    let heartbeater = backends
        .heartbeaters()
        .create(
            &settings.heartbeater_type,
            &settings.backend_options(BackendKind::Heartbeater),
            prev.map(|p| &p.heartbeater),
        )
        .map_err(backend_error(BackendKind::Heartbeater, &settings))?;

    debug!(
        version,
        queue = queue.name(),
        uploader = uploader.name(),
        downloader = downloader.name(),
        heartbeater = heartbeater.name(),
        "backends built"
    );

    Ok(Configuration {
        version,
        settings,
        queue,
        uploader,
        downloader,
        heartbeater,
    })
}

fn backend_error(kind: BackendKind, settings: &WorkerSettings) -> impl FnOnce(BackendError) -> ConfigError {
    let id = settings.backend_type(kind).to_string();
    move |source| ConfigError::Backend { kind, id, source }
}
