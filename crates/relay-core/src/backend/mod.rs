//! Backend capability traits and their registry.
//!
//! Every role (queue, uploader, downloader, heartbeater) is an async trait object
//! created by a factory looked up by identifier. Factories receive the handle that is
//! currently live for the same role, so state such as an obtained worker id survives a
//! configuration reload.
mod error;
pub use error::BackendError;

mod slot;
pub use slot::WorkerSlot;

pub mod memory;

use std::{path::Path, sync::Arc, time::Duration};

use async_trait::async_trait;
use relay_model::{BackendOptions, CompletionReport, JobDescription, JobId, WorkerId};

use crate::registry::{Registry, RegistryError};

/// Source of job descriptions.
#[async_trait]
pub trait Queue: Send + Sync {
    /// Backend identifier, used in logs and to decide whether a previous handle is reusable.
    fn name(&self) -> &'static str;

    /// Take the next description, waiting at most `idle` for one to arrive.
    ///
    /// A returned description has been accepted and is no longer visible to other workers.
    ///
    /// Must be cancel-safe: the manager drops a pending poll when draining, so a message may
    /// only leave the backend in the same step that returns it.
    async fn poll(&self, idle: Duration) -> Result<Option<JobDescription>, BackendError>;
}

/// Client of the coordinating server.
///
/// `register` fails if the instance already holds a worker id; every other remote call
/// fails with [`BackendError::NotRegistered`] while it holds none.
#[async_trait]
pub trait Heartbeater: Send + Sync {
    fn name(&self) -> &'static str;

    /// Worker id assigned by the server, `None` before registration and after unregister.
    fn worker_id(&self) -> Option<WorkerId>;

    async fn register(&self) -> Result<WorkerId, BackendError>;

    async fn heartbeat(&self, job: Option<&JobId>) -> Result<(), BackendError>;

    async fn signal_start(&self, job: &JobId) -> Result<(), BackendError>;

    async fn signal_completion(
        &self,
        job: &JobId,
        report: &CompletionReport,
    ) -> Result<(), BackendError>;

    async fn unregister(&self) -> Result<(), BackendError>;
}

#[async_trait]
pub trait Uploader: Send + Sync {
    fn name(&self) -> &'static str;

    /// Store the file at `local` under `key`.
    async fn upload(&self, local: &Path, key: &str) -> Result<(), BackendError>;
}

#[async_trait]
pub trait Downloader: Send + Sync {
    fn name(&self) -> &'static str;

    /// Fetch `key` into `local`, creating parent directories.
    async fn download(&self, key: &str, local: &Path) -> Result<(), BackendError>;
}

/// Builds a backend handle of type `T` from its options and the previous handle of the role.
pub trait BackendFactory<T: ?Sized>: Send + Sync {
    fn create(
        &self,
        options: &BackendOptions,
        previous: Option<&Arc<T>>,
    ) -> Result<Arc<T>, BackendError>;
}

impl<T, F> BackendFactory<T> for F
where
    T: ?Sized,
    F: Fn(&BackendOptions, Option<&Arc<T>>) -> Result<Arc<T>, BackendError> + Send + Sync,
{
    fn create(
        &self,
        options: &BackendOptions,
        previous: Option<&Arc<T>>,
    ) -> Result<Arc<T>, BackendError> {
        self(options, previous)
    }
}

impl<T: ?Sized + 'static> Registry<dyn BackendFactory<T>> {
    /// Register a plain function or closure as the factory for `id`.
    ///
    /// # Examples
    /// ```
    /// use std::sync::Arc;
    /// use relay_core::backend::memory::MemoryQueue;
    /// use relay_core::prelude::*;
    /// use relay_model::BackendOptions;
    ///
    /// let mut backends = BackendRegistry::new();
    /// backends
    ///     .queues_mut()
    ///     .register_fn("inbox", |_opts, _prev| {
    ///         let q: Arc<dyn Queue> = Arc::new(MemoryQueue::new());
    ///         Ok(q)
    ///     })
    ///     .unwrap();
    ///
    /// let queue = backends.queues().create("inbox", &BackendOptions::new(), None).unwrap();
    /// assert_eq!(queue.name(), "memory");
    /// assert!(backends.queues().create("sqs", &BackendOptions::new(), None).is_err());
    /// ```
    pub fn register_fn<F>(&mut self, id: impl Into<String>, factory: F) -> Result<(), RegistryError>
    where
        F: Fn(&BackendOptions, Option<&Arc<T>>) -> Result<Arc<T>, BackendError>
            + Send
            + Sync
            + 'static,
    {
        self.register(id, Arc::new(factory))
    }

    /// Construct a handle through the factory bound to `id`.
    pub fn create(
        &self,
        id: &str,
        options: &BackendOptions,
        previous: Option<&Arc<T>>,
    ) -> Result<Arc<T>, BackendError> {
        self.lookup(id)?.create(options, previous)
    }
}

/// One registry per backend role.
pub struct BackendRegistry {
    queues: Registry<dyn BackendFactory<dyn Queue>>,
    uploaders: Registry<dyn BackendFactory<dyn Uploader>>,
    downloaders: Registry<dyn BackendFactory<dyn Downloader>>,
    heartbeaters: Registry<dyn BackendFactory<dyn Heartbeater>>,
}

impl BackendRegistry {
    /// Empty registries.
    pub fn new() -> Self {
        Self {
            queues: Registry::new("queue"),
            uploaders: Registry::new("uploader"),
            downloaders: Registry::new("downloader"),
            heartbeaters: Registry::new("heartbeater"),
        }
    }

    /// Registries pre-populated with the in-process `memory` backends.
    pub fn with_memory_backends() -> Result<Self, RegistryError> {
        let mut reg = Self::new();
        memory::register_memory_backends(&mut reg)?;
        Ok(reg)
    }

    pub fn queues(&self) -> &Registry<dyn BackendFactory<dyn Queue>> {
        &self.queues
    }

    pub fn queues_mut(&mut self) -> &mut Registry<dyn BackendFactory<dyn Queue>> {
        &mut self.queues
    }

    pub fn uploaders(&self) -> &Registry<dyn BackendFactory<dyn Uploader>> {
        &self.uploaders
    }

    pub fn uploaders_mut(&mut self) -> &mut Registry<dyn BackendFactory<dyn Uploader>> {
        &mut self.uploaders
    }

    pub fn downloaders(&self) -> &Registry<dyn BackendFactory<dyn Downloader>> {
        &self.downloaders
    }

    pub fn downloaders_mut(&mut self) -> &mut Registry<dyn BackendFactory<dyn Downloader>> {
        &mut self.downloaders
    }

    pub fn heartbeaters(&self) -> &Registry<dyn BackendFactory<dyn Heartbeater>> {
        &self.heartbeaters
    }

    pub fn heartbeaters_mut(&mut self) -> &mut Registry<dyn BackendFactory<dyn Heartbeater>> {
        &mut self.heartbeaters
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("queues", &self.queues)
            .field("uploaders", &self.uploaders)
            .field("downloaders", &self.downloaders)
            .field("heartbeaters", &self.heartbeaters)
            .finish()
    }
}
