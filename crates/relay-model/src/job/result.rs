use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Return code of a job that finished successfully.
pub const RETURN_CODE_SUCCESS: i32 = 0;

/// Return code synthesized when a job faulted inside the worker (construction error, panic, ...).
pub const RETURN_CODE_INTERNAL_FAULT: i32 = 255;

/// Return code synthesized when a job was stopped by a termination request it did not answer.
pub const RETURN_CODE_TERMINATED: i32 = 143;

/// Outcome of one job execution.
///
/// `return_code` is the only field the worker interprets; everything else (timings,
/// correctness flags, artifact keys) is forwarded to the server as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_code: Option<i32>,

    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl JobResult {
    /// A successful result without extra fields.
    pub fn success() -> Self {
        Self::with_return_code(RETURN_CODE_SUCCESS)
    }

    pub fn with_return_code(code: i32) -> Self {
        Self {
            return_code: Some(code),
            fields: Map::new(),
        }
    }

    /// Synthetic result for a fault that escaped the job.
    pub fn errored(reason: impl Into<String>) -> Self {
        Self::with_return_code(RETURN_CODE_INTERNAL_FAULT).with_field("error", reason.into())
    }

    /// Synthetic result for a job that had to be stopped forcibly.
    pub fn terminated() -> Self {
        Self::with_return_code(RETURN_CODE_TERMINATED).with_field("terminated", true)
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    #[inline]
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// A missing or non-zero return code marks the job as failed.
    #[inline]
    pub fn is_failure(&self) -> bool {
        self.return_code != Some(RETURN_CODE_SUCCESS)
    }
}
