mod description;
pub use description::JobDescription;

mod result;
pub use result::JobResult;
pub use result::{RETURN_CODE_INTERNAL_FAULT, RETURN_CODE_SUCCESS, RETURN_CODE_TERMINATED};

mod report;
pub use report::CompletionReport;
