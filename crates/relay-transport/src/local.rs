//! Uploader and downloader over the local filesystem.
//!
//! Keys are relative paths below a root directory. A downloader may also serve an
//! explicit `files` map of key to path, which takes precedence over its root.
use std::{
    collections::BTreeMap,
    path::{Component, Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use relay_core::backend::{BackendError, Downloader, Uploader};
use relay_model::{BackendOptions, ModelError};
use tracing::debug;

use crate::TransportError;

/// Copies uploads to `destination_directory/<key>`.
#[derive(Debug, Clone)]
pub struct LocalUploader {
    root: PathBuf,
}

impl LocalUploader {
    pub const NAME: &'static str = "local";

    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl Uploader for LocalUploader {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn upload(&self, local: &Path, key: &str) -> Result<(), BackendError> {
        let dest = resolve(&self.root, key)?;
        copy(local, &dest).await?;
        debug!(key, dest = %dest.display(), "uploaded");
        Ok(())
    }
}

/// Serves downloads from `files` or from `source_directory/<key>`.
#[derive(Debug, Clone, Default)]
pub struct LocalDownloader {
    root: Option<PathBuf>,
    files: BTreeMap<String, PathBuf>,
}

impl LocalDownloader {
    pub const NAME: &'static str = "local";

    pub fn new(root: Option<PathBuf>) -> Self {
        Self {
            root,
            files: BTreeMap::new(),
        }
    }

    pub fn with_file(mut self, key: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.files.insert(key.into(), path.into());
        self
    }

    fn source(&self, key: &str) -> Result<PathBuf, BackendError> {
        if let Some(path) = self.files.get(key) {
            return Ok(path.clone());
        }
        match &self.root {
            Some(root) => Ok(resolve(root, key)?),
            None => Err(BackendError::NotFound(key.to_string())),
        }
    }
}

#[async_trait]
impl Downloader for LocalDownloader {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn download(&self, key: &str, local: &Path) -> Result<(), BackendError> {
        let source = self.source(key)?;
        copy(&source, local).await?;
        debug!(key, source = %source.display(), "downloaded");
        Ok(())
    }
}

fn resolve(root: &Path, key: &str) -> Result<PathBuf, TransportError> {
    let rel = Path::new(key);
    let inside = rel.components().next().is_some()
        && rel.components().all(|c| matches!(c, Component::Normal(_)));
    if !inside {
        return Err(TransportError::Key(key.to_string()));
    }
    Ok(root.join(rel))
}

async fn copy(from: &Path, to: &Path) -> Result<(), TransportError> {
    if let Some(parent) = to.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| TransportError::File {
                path: parent.to_path_buf(),
                source,
            })?;
    }
    tokio::fs::copy(from, to)
        .await
        .map_err(|source| TransportError::File {
            path: from.to_path_buf(),
            source,
        })?;
    Ok(())
}

pub(crate) fn create_uploader(
    opts: &BackendOptions,
    _previous: Option<&Arc<dyn Uploader>>,
) -> Result<Arc<dyn Uploader>, BackendError> {
    let root = opts.require_path("destination_directory")?;
    let up: Arc<dyn Uploader> = Arc::new(LocalUploader::new(root));
    Ok(up)
}

pub(crate) fn create_downloader(
    opts: &BackendOptions,
    _previous: Option<&Arc<dyn Downloader>>,
) -> Result<Arc<dyn Downloader>, BackendError> {
    let root = opts.get_path("source_directory")?;
    let files = opts
        .decode::<BTreeMap<String, PathBuf>>("files")?
        .unwrap_or_default();
    if root.is_none() && files.is_empty() {
        return Err(ModelError::MissingOption("source_directory".into()).into());
    }

    let mut down = LocalDownloader::new(root);
    for (key, path) in files {
        down = down.with_file(key, path);
    }
    let down: Arc<dyn Downloader> = Arc::new(down);
    Ok(down)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_stay_below_the_root() {
        let root = Path::new("/srv/objects");
        assert_eq!(
            resolve(root, "builds/app.jar").unwrap(),
            PathBuf::from("/srv/objects/builds/app.jar")
        );
        for bad in ["", "/etc/passwd", "../x", "a/../../x", "./a"] {
            assert!(matches!(resolve(root, bad), Err(TransportError::Key(_))), "{bad}");
        }
    }

    #[test]
    fn downloader_needs_a_source() {
        let err = create_downloader(&BackendOptions::new(), None).err().unwrap();
        assert!(matches!(err, BackendError::Options(ModelError::MissingOption(_))));
    }

    #[test]
    fn uploader_needs_a_destination() {
        assert!(create_uploader(&BackendOptions::new(), None).is_err());
    }
}
