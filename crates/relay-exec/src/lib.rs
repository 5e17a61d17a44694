//! Jobs that run external programs.
mod error;
pub use error::ExecError;

mod limits;
pub use limits::attach_limits;

mod raw_log;

pub mod subprocess;
pub use subprocess::{SUBPROCESS_JOB_TYPE, SubprocessJob, SubprocessSpec, register_subprocess_job};
