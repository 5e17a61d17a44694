use std::path::PathBuf;

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

use crate::ModelError;

/// Free-form option map handed to a backend factory.
///
/// The worker never interprets these; each backend documents and validates its own keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BackendOptions(Map<String, Value>);

impl BackendOptions {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    #[inline]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    #[inline]
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Insert `value` unless the key is already present.
    pub fn insert_if_absent(&mut self, key: &str, value: impl Into<Value>) {
        if !self.0.contains_key(key) {
            self.0.insert(key.to_string(), value.into());
        }
    }

    pub fn get_str(&self, key: &str) -> Result<Option<&str>, ModelError> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(other) => Err(ModelError::InvalidOption {
                key: key.to_string(),
                reason: format!("expected a string, got {other}"),
            }),
        }
    }

    pub fn require_str(&self, key: &str) -> Result<&str, ModelError> {
        self.get_str(key)?
            .ok_or_else(|| ModelError::MissingOption(key.to_string()))
    }

    pub fn get_u64(&self, key: &str) -> Result<Option<u64>, ModelError> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(v) => v.as_u64().map(Some).ok_or_else(|| ModelError::InvalidOption {
                key: key.to_string(),
                reason: format!("expected a non-negative integer, got {v}"),
            }),
        }
    }

    pub fn get_path(&self, key: &str) -> Result<Option<PathBuf>, ModelError> {
        Ok(self.get_str(key)?.map(PathBuf::from))
    }

    pub fn require_path(&self, key: &str) -> Result<PathBuf, ModelError> {
        self.require_str(key).map(PathBuf::from)
    }

    /// Decode one option into a typed value.
    pub fn decode<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ModelError> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(v) => serde_json::from_value(v.clone())
                .map(Some)
                .map_err(|e| ModelError::InvalidOption {
                    key: key.to_string(),
                    reason: e.to_string(),
                }),
        }
    }
}

impl From<Map<String, Value>> for BackendOptions {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}
