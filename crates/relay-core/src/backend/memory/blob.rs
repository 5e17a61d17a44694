use std::{
    collections::HashMap,
    path::Path,
    sync::{Mutex, PoisonError},
};

use async_trait::async_trait;

use crate::backend::{BackendError, Downloader, Uploader};

/// In-process object store keyed by caller-chosen keys.
///
/// Serves as both the `memory` uploader and the `memory` downloader.
#[derive(Debug, Default)]
pub struct MemoryBlobs {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobs {
    pub const NAME: &'static str = "memory";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), bytes.into());
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Stored keys in sorted order.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        keys.sort_unstable();
        keys
    }
}

#[async_trait]
impl Uploader for MemoryBlobs {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn upload(&self, local: &Path, key: &str) -> Result<(), BackendError> {
        let bytes = tokio::fs::read(local).await?;
        self.insert(key, bytes);
        Ok(())
    }
}

#[async_trait]
impl Downloader for MemoryBlobs {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn download(&self, key: &str, local: &Path) -> Result<(), BackendError> {
        let bytes = self
            .get(key)
            .ok_or_else(|| BackendError::NotFound(key.to_string()))?;
        if let Some(parent) = local.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(local, bytes).await?;
        Ok(())
    }
}
