use std::sync::{Mutex, PoisonError};

use relay_model::WorkerId;

use crate::backend::BackendError;

/// Worker id held by a heartbeater instance.
///
/// Enforces the register/unregister contract shared by every heartbeater: one id at a
/// time, and remote calls only while an id is held.
#[derive(Debug, Default)]
pub struct WorkerSlot(Mutex<Option<WorkerId>>);

impl WorkerSlot {
    pub fn new(id: Option<WorkerId>) -> Self {
        Self(Mutex::new(id))
    }

    pub fn get(&self) -> Option<WorkerId> {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The held id, or [`BackendError::NotRegistered`].
    pub fn require(&self) -> Result<WorkerId, BackendError> {
        self.get().ok_or(BackendError::NotRegistered)
    }

    /// Fails with [`BackendError::AlreadyRegistered`] when an id is held.
    pub fn ensure_vacant(&self) -> Result<(), BackendError> {
        match self.get() {
            Some(id) => Err(BackendError::AlreadyRegistered(id)),
            None => Ok(()),
        }
    }

    pub fn set(&self, id: WorkerId) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = Some(id);
    }

    pub fn clear(&self) -> Option<WorkerId> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}
