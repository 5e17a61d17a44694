use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{DeliveryToken, JobResult};

/// Body of the completion signal sent to the server once a job finishes.
///
/// Built by merging the job result with worker-side bookkeeping. Worker-side keys
/// (`return_code`, `secret_key`, `started_at`, `runtime_seconds`) win over same-named
/// result fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompletionReport(Map<String, Value>);

impl CompletionReport {
    pub fn new(
        result: JobResult,
        secret_key: Option<&DeliveryToken>,
        started_at: impl Into<String>,
        runtime_seconds: f64,
    ) -> Self {
        let JobResult {
            return_code,
            mut fields,
        } = result;

        fields.insert(
            "return_code".into(),
            return_code.map(Value::from).unwrap_or(Value::Null),
        );
        fields.insert(
            "secret_key".into(),
            secret_key
                .map(|t| Value::from(t.as_str()))
                .unwrap_or(Value::Null),
        );
        fields.insert("started_at".into(), Value::from(started_at.into()));
        fields.insert("runtime_seconds".into(), Value::from(runtime_seconds));
        Self(fields)
    }

    pub fn return_code(&self) -> Option<i32> {
        self.0
            .get("return_code")
            .and_then(Value::as_i64)
            .and_then(|c| i32::try_from(c).ok())
    }

    pub fn secret_key(&self) -> Option<&str> {
        self.0.get("secret_key").and_then(Value::as_str)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}
