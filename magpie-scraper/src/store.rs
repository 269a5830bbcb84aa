use crate::extract::ItemId;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Durable set of identifiers that have been fully materialized.
///
/// The on-disk format is a JSON array of identifier strings. Every `mark`
/// rewrites the whole file (write-through), so an interrupted run never loses
/// a completed item; the O(n) rewrite is acceptable at harvesting scale.
/// Durability is best-effort: load and flush failures degrade to an
/// in-memory-only set with a warning rather than aborting the run.
pub struct ProcessedLedger {
    path: PathBuf,
    ids: HashSet<ItemId>,
}

impl ProcessedLedger {
    /// Load the ledger at `path`. A missing file is an empty ledger, not an
    /// error; an unreadable or corrupt file is logged and treated the same.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let ids = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<Vec<ItemId>>(&raw) {
                Ok(list) => {
                    info!(path = %path.display(), count = list.len(), "loaded processed ledger");
                    list.into_iter().collect()
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "corrupt processed ledger, starting empty");
                    HashSet::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no processed ledger yet, starting empty");
                HashSet::new()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not read processed ledger, starting empty");
                HashSet::new()
            }
        };
        Self { path, ids }
    }

    pub fn contains(&self, id: &ItemId) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record `id` as fully materialized and flush the whole set to disk.
    pub fn mark(&mut self, id: ItemId) {
        self.ids.insert(id);
        if let Err(e) = self.flush() {
            warn!(path = %self.path.display(), error = %e, "failed to persist processed ledger, continuing in memory");
        }
    }

    fn flush(&self) -> std::io::Result<()> {
        let mut list: Vec<&ItemId> = self.ids.iter().collect();
        list.sort();
        let body = serde_json::to_string_pretty(&list)?;
        // Write to a sibling and rename so an interrupted flush never
        // truncates previously persisted state.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, body)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
