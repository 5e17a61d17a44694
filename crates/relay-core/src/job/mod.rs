//! Job contract and the job factory.
//!
//! Concrete jobs live outside this crate and are plugged in through a [`JobRegistry`]
//! keyed by the description's `job_type`.
mod error;
pub use error::JobError;

mod context;
pub use context::JobContext;

mod factory;
pub use factory::{JobFactory, JobRegistry};

use async_trait::async_trait;
use relay_model::JobResult;

/// Unit of work created from one job description.
///
/// Implementations translate every external-tool failure into a [`JobResult`] with a
/// non-zero `return_code`; an `Err` is reserved for faults the job could not classify
/// and is turned into an internal-fault result by the runner.
#[async_trait]
pub trait Job: Send + Sync {
    /// Job type, used in logs.
    fn name(&self) -> &str;

    async fn run(&self, ctx: JobContext) -> Result<JobResult, JobError>;

    /// Best-effort request to stop. Must not block.
    ///
    /// Jobs that spawn subprocesses should signal their process group here.
    fn terminate(&self);
}
