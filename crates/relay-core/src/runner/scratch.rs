use std::{
    io,
    path::{Path, PathBuf},
};

use tracing::{debug, warn};

/// Create `<tmp_dir>/<job_type>-<uuid>`.
pub(super) async fn create(tmp_dir: &Path, job_type: &str) -> io::Result<PathBuf> {
    let name: String = job_type
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    let dir = tmp_dir.join(format!("{name}-{}", uuid::Uuid::new_v4()));
    tokio::fs::create_dir_all(&dir).await?;
    debug!(workdir = %dir.display(), "scratch directory created");
    Ok(dir)
}

pub(super) async fn remove(dir: &Path) {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => debug!(workdir = %dir.display(), "scratch directory removed"),
        Err(e) => warn!(workdir = %dir.display(), error = %e, "cannot remove scratch directory"),
    }
}
