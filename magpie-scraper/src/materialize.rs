use crate::error::{Result, ScrapeError};
use crate::extract::ItemId;
use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A persisted artifact: the bytes of one materialized item on disk.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub id: ItemId,
    pub path: PathBuf,
    pub bytes: u64,
}

/// Turns one surviving identifier into a persisted artifact.
///
/// Implementations resolve the best available representation of the item,
/// fetch the bytes, and write them with `write_artifact` so a file either
/// holds the complete content or does not exist at all. Failure leaves no
/// trace on disk and no ledger mark, which is what makes a later run retry.
#[async_trait]
pub trait Materializer: Send + Sync {
    /// Deterministic output path for `id`. Used both for writing and for the
    /// file-already-exists duplicate check.
    fn artifact_path(&self, id: &ItemId) -> PathBuf;

    async fn materialize(&self, id: &ItemId) -> Result<Artifact>;
}

/// Write `bytes` to `path` atomically: full content to a `.part` sibling,
/// then rename. Empty content is rejected rather than written.
pub fn write_artifact(id: &ItemId, path: &Path, bytes: &[u8]) -> Result<Artifact> {
    if bytes.is_empty() {
        return Err(ScrapeError::EmptyContent(id.to_string()));
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let part = path.with_extension("part");
    fs::write(&part, bytes)?;
    fs::rename(&part, path)?;
    debug!(id = %id, path = %path.display(), bytes = bytes.len(), "artifact written");

    Ok(Artifact {
        id: id.clone(),
        path: path.to_path_buf(),
        bytes: bytes.len() as u64,
    })
}
