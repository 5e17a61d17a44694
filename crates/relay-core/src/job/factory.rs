use std::{fmt, sync::Arc};

use relay_model::JobDescription;

use crate::config::ConfigStore;
use crate::job::{Job, JobError};
use crate::registry::{Registry, RegistryError};

/// Builds a job from its description.
pub trait JobFactory: Send + Sync {
    fn create(
        &self,
        description: &JobDescription,
        config: &Arc<ConfigStore>,
    ) -> Result<Arc<dyn Job>, JobError>;
}

impl<F> JobFactory for F
where
    F: Fn(&JobDescription, &Arc<ConfigStore>) -> Result<Arc<dyn Job>, JobError> + Send + Sync,
{
    fn create(
        &self,
        description: &JobDescription,
        config: &Arc<ConfigStore>,
    ) -> Result<Arc<dyn Job>, JobError> {
        self(description, config)
    }
}

/// `job_type` → factory table.
pub struct JobRegistry {
    inner: Registry<dyn JobFactory>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self {
            inner: Registry::new("job type"),
        }
    }

    pub fn register(
        &mut self,
        job_type: impl Into<String>,
        factory: Arc<dyn JobFactory>,
    ) -> Result<(), RegistryError> {
        self.inner.register(job_type, factory)
    }

    /// Register a plain function or closure as the factory for `job_type`.
    pub fn register_fn<F>(&mut self, job_type: impl Into<String>, factory: F) -> Result<(), RegistryError>
    where
        F: Fn(&JobDescription, &Arc<ConfigStore>) -> Result<Arc<dyn Job>, JobError>
            + Send
            + Sync
            + 'static,
    {
        self.inner.register(job_type, Arc::new(factory))
    }

    pub fn unregister(&mut self, job_type: &str) -> bool {
        self.inner.unregister(job_type).is_some()
    }

    pub fn contains(&self, job_type: &str) -> bool {
        self.inner.contains(job_type)
    }

    /// Dispatch on `description.job_type`.
    ///
    /// Fails with [`JobError::MissingType`] or [`JobError::Unknown`] before anything is
    /// constructed.
    pub fn create(
        &self,
        description: &JobDescription,
        config: &Arc<ConfigStore>,
    ) -> Result<Arc<dyn Job>, JobError> {
        let job_type = description.job_type().ok_or(JobError::MissingType)?;
        self.inner.lookup(job_type)?.create(description, config)
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for JobRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("JobRegistry").field(&self.inner).finish()
    }
}
