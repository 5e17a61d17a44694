//! In-process backends.
//!
//! Useful for tests and for running a worker without any external service. Each one is
//! registered under the identifier `memory`.
//!
//! Options:
//! - queue: `jobs` (list of job descriptions pre-loaded in order)
//! - heartbeater: `worker_id` (id handed out on register, default 1234)
//! - downloader: `objects` (map of key to UTF-8 content served on download)
mod blob;
pub use blob::MemoryBlobs;

mod heartbeat;
pub use heartbeat::{DEFAULT_MEMORY_WORKER_ID, HeartbeatEvent, MemoryHeartbeater};

mod queue;
pub use queue::MemoryQueue;

use std::{collections::BTreeMap, sync::Arc};

use relay_model::{BackendOptions, JobDescription, WorkerId};

use crate::backend::{BackendError, BackendRegistry, Downloader, Heartbeater, Queue, Uploader};
use crate::registry::RegistryError;

/// Register the `memory` backend for every role.
pub fn register_memory_backends(reg: &mut BackendRegistry) -> Result<(), RegistryError> {
    reg.queues_mut().register_fn(MemoryQueue::NAME, memory_queue)?;
    reg.heartbeaters_mut()
        .register_fn(MemoryHeartbeater::NAME, memory_heartbeater)?;
    reg.uploaders_mut().register_fn(MemoryBlobs::NAME, memory_uploader)?;
    reg.downloaders_mut()
        .register_fn(MemoryBlobs::NAME, memory_downloader)?;
    Ok(())
}

fn memory_queue(
    opts: &BackendOptions,
    previous: Option<&Arc<dyn Queue>>,
) -> Result<Arc<dyn Queue>, BackendError> {
    // Pending jobs live in the instance; a reload keeps it.
    if let Some(prev) = previous.filter(|p| p.name() == MemoryQueue::NAME) {
        return Ok(prev.clone());
    }

    let queue = MemoryQueue::new();
    for description in opts.decode::<Vec<JobDescription>>("jobs")?.unwrap_or_default() {
        queue.enqueue(description);
    }
    let queue: Arc<dyn Queue> = Arc::new(queue);
    Ok(queue)
}

fn memory_heartbeater(
    opts: &BackendOptions,
    previous: Option<&Arc<dyn Heartbeater>>,
) -> Result<Arc<dyn Heartbeater>, BackendError> {
    let assign = opts
        .get_u64("worker_id")?
        .map(WorkerId::new)
        .unwrap_or(DEFAULT_MEMORY_WORKER_ID);

    let mut hb = MemoryHeartbeater::new(assign);
    if let Some(id) = previous.and_then(|p| p.worker_id()) {
        hb = hb.registered_as(id);
    }
    let hb: Arc<dyn Heartbeater> = Arc::new(hb);
    Ok(hb)
}

fn memory_uploader(
    _opts: &BackendOptions,
    previous: Option<&Arc<dyn Uploader>>,
) -> Result<Arc<dyn Uploader>, BackendError> {
    if let Some(prev) = previous.filter(|p| p.name() == MemoryBlobs::NAME) {
        return Ok(prev.clone());
    }
    let blobs: Arc<dyn Uploader> = Arc::new(MemoryBlobs::new());
    Ok(blobs)
}

fn memory_downloader(
    opts: &BackendOptions,
    _previous: Option<&Arc<dyn Downloader>>,
) -> Result<Arc<dyn Downloader>, BackendError> {
    let blobs = MemoryBlobs::new();
    for (key, content) in opts
        .decode::<BTreeMap<String, String>>("objects")?
        .unwrap_or_default()
    {
        blobs.insert(key, content.into_bytes());
    }
    let blobs: Arc<dyn Downloader> = Arc::new(blobs);
    Ok(blobs)
}
