use async_trait::async_trait;
use std::path::Path;
use tracing::{debug, error, info};

use crate::aggregate;
use crate::contract::Storage;
use crate::error::{Error, Result};
use crate::model::{FetchOutcome, PipelineFile, Version};

/// [`Storage`] backed by the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalStorage;

#[async_trait]
impl Storage for LocalStorage {
    async fn create_dir_all(&self, path: &Path) -> std::io::Result<()> {
        tokio::fs::create_dir_all(path).await
    }

    async fn write_file(&self, path: &Path, contents: &[u8]) -> std::io::Result<()> {
        tokio::fs::write(path, contents).await
    }
}

/// Create `dir` if needed, then write every file into it in order.
///
/// A directory that cannot be created aborts before any write. A failed write stops
/// the loop; files written before it stay on disk.
pub async fn persist_files<S>(storage: &S, dir: &Path, files: &[PipelineFile]) -> Result<()>
where
    S: Storage + ?Sized,
{
    ensure_dir(storage, dir).await?;

    for file in files {
        let path = dir.join(&file.filename);
        debug!(path = %path.display(), bytes = file.contents.len(), "Writing pipeline config");
        if let Err(e) = storage.write_file(&path, &file.contents).await {
            error!(error = ?e, path = %path.display(), "Failed to write pipeline config");
            return Err(Error::Persistence { path, source: e });
        }
    }

    info!(dir = %dir.display(), files = files.len(), "Wrote pipeline configs");
    Ok(())
}

/// Create `dir` and any missing parents. Failure is a fatal [`Error::DirectoryCreation`].
pub async fn ensure_dir<S>(storage: &S, dir: &Path) -> Result<()>
where
    S: Storage + ?Sized,
{
    debug!(dir = %dir.display(), "Creating directory");
    storage.create_dir_all(dir).await.map_err(|e| {
        error!(error = ?e, dir = %dir.display(), "Failed to create directory");
        Error::DirectoryCreation {
            path: dir.to_path_buf(),
            source: e,
        }
    })
}

/// Version carrying the fingerprint of `outcomes`.
pub fn emit_fingerprint(outcomes: &[FetchOutcome]) -> Version {
    let checksum = aggregate::fingerprint(outcomes);
    info!(checksum = %checksum, pipelines = outcomes.len(), "Computed pipelines checksum");
    Version {
        pipelines_checksum: Some(checksum),
    }
}
