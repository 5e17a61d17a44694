use std::{
    collections::VecDeque,
    sync::{
        Mutex, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use relay_model::{DeliveryToken, JobDescription};
use tokio::{sync::Notify, time::Instant};
use tracing::debug;

use crate::backend::{BackendError, Queue};

/// In-process FIFO queue.
///
/// Descriptions without a delivery token get `memory-<n>` on enqueue.
#[derive(Debug, Default)]
pub struct MemoryQueue {
    items: Mutex<VecDeque<JobDescription>>,
    arrived: Notify,
    next_token: AtomicU64,
}

impl MemoryQueue {
    pub const NAME: &'static str = "memory";

    pub fn new() -> Self {
        Self::default()
    }

    /// Append a description and wake one waiting poller.
    ///
    /// Returns the delivery token the description will be handed out with.
    pub fn enqueue(&self, mut description: JobDescription) -> DeliveryToken {
        let token = description
            .secret_key
            .get_or_insert_with(|| {
                let n = self.next_token.fetch_add(1, Ordering::Relaxed) + 1;
                DeliveryToken::new(format!("memory-{n}"))
            })
            .clone();

        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(description);
        self.arrived.notify_one();
        token
    }

    pub fn len(&self) -> usize {
        self.items.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn pop(&self) -> Option<JobDescription> {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }
}

#[async_trait]
impl Queue for MemoryQueue {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn poll(&self, idle: Duration) -> Result<Option<JobDescription>, BackendError> {
        let deadline = Instant::now() + idle;
        loop {
            let arrived = self.arrived.notified();
            if let Some(description) = self.pop() {
                debug!(secret_key = ?description.secret_key, "memory queue handed out a job");
                return Ok(Some(description));
            }
            if tokio::time::timeout_at(deadline, arrived).await.is_err() {
                return Ok(None);
            }
        }
    }
}
