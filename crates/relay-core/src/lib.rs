//! Worker coordination engine.
//!
//! A [`manager::Manager`] registers with the coordinating server, pulls job descriptions
//! from the configured queue and hands each one to a fresh [`runner::Runner`]. Backends
//! (queue, uploader, downloader, heartbeater) and jobs are resolved by identifier through
//! explicit registries that are built once at startup and injected where needed.
pub mod backend;
pub mod config;
pub mod error;
pub mod job;
pub mod manager;
pub mod process;
pub mod registry;
pub mod runner;

pub mod prelude {
    pub use crate::backend::{
        BackendError, BackendFactory, BackendRegistry, Downloader, Heartbeater, Queue, Uploader,
    };
    pub use crate::config::{ConfigError, ConfigStore, Configuration};
    pub use crate::error::CoreError;
    pub use crate::job::{Job, JobContext, JobError, JobFactory, JobRegistry};
    pub use crate::manager::{ControlHandle, Manager, ManagerState, ShutdownLevel};
    pub use crate::process::ProcessGroup;
    pub use crate::registry::{Registry, RegistryError};
    pub use crate::runner::{Outcome, Runner, RunnerState};
}
