use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

use crate::{DeliveryToken, JobId, ModelError};

/// Unit of work delivered by a queue backend.
///
/// The `job_type` discriminator selects the job implementation; everything else that
/// is not a well-known field lands in `payload` untouched and is interpreted only by
/// the job itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobDescription {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<JobId>,

    /// Queue-assigned delivery token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<DeliveryToken>,

    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl JobDescription {
    /// Create a description for the given job type with an empty payload.
    pub fn new(job_type: impl Into<String>) -> Self {
        Self {
            job_type: Some(job_type.into()),
            ..Default::default()
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    pub fn with_job_id(mut self, id: impl Into<String>) -> Self {
        self.job_id = Some(JobId::new(id));
        self
    }

    pub fn with_secret_key(mut self, token: DeliveryToken) -> Self {
        self.secret_key = Some(token);
        self
    }

    #[inline]
    pub fn job_type(&self) -> Option<&str> {
        self.job_type.as_deref()
    }

    #[inline]
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    /// Job id used when talking to the server.
    ///
    /// Falls back to the delivery token when the description carries no explicit id.
    pub fn effective_job_id(&self) -> Option<JobId> {
        self.job_id
            .clone()
            .or_else(|| self.secret_key.as_ref().map(JobId::from))
    }

    /// Decode the payload into a job-specific parameter struct.
    pub fn decode_payload<T: DeserializeOwned>(&self) -> Result<T, ModelError> {
        serde_json::from_value(Value::Object(self.payload.clone()))
            .map_err(|e| ModelError::InvalidPayload(e.to_string()))
    }
}
