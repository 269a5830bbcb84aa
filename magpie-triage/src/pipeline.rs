use crate::classifier::VisionClient;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "webp"];

pub struct TriageOptions {
    pub input_dir: PathBuf,
    pub matched_dir: PathBuf,
}

/// Callback for human-readable progress lines.
pub type TriageProgressCallback = Arc<dyn Fn(String) + Send + Sync>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriageSummary {
    /// Files the model was asked about.
    pub examined: usize,
    /// Files the model matched; these moved to the matched directory.
    pub matched: usize,
    /// Files the model rejected; left in place.
    pub unmatched: usize,
    /// Files that could not be judged (PDFs with no extractable text).
    pub undecided: usize,
    /// Files where classification or the move itself failed.
    pub failed: usize,
}

enum Verdict {
    Matched,
    Unmatched,
    Undecided,
}

/// Walk `input_dir` and sort its files by model verdict, moving matches into
/// `matched_dir`. Per-file failures are counted and the walk continues.
pub async fn run_triage(
    options: &TriageOptions,
    client: &VisionClient,
    progress_callback: Option<TriageProgressCallback>,
) -> Result<TriageSummary> {
    fs::create_dir_all(&options.matched_dir)?;

    let mut summary = TriageSummary::default();
    info!(input = %options.input_dir.display(), matched = %options.matched_dir.display(),
        model = client.model(), "starting triage");

    for entry in WalkDir::new(&options.input_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(e) if e.file_type().is_file() => e,
            Ok(_) => continue,
            Err(e) => {
                warn!(error = %e, "unreadable directory entry");
                summary.failed += 1;
                continue;
            }
        };
        let path = entry.path();

        let Some(ext) = extension_of(path) else {
            continue;
        };
        if !IMAGE_EXTENSIONS.contains(&ext.as_str()) && ext != "pdf" {
            debug!(path = %path.display(), "ignoring unsupported extension");
            continue;
        }

        summary.examined += 1;
        if let Some(ref cb) = progress_callback {
            cb(format!("examining {}", path.display()));
        }

        match classify_file(client, path, &ext).await {
            Ok(Verdict::Matched) => match move_into(path, &options.matched_dir) {
                Ok(dest) => {
                    info!(from = %path.display(), to = %dest.display(), "matched");
                    summary.matched += 1;
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to move matched file");
                    summary.failed += 1;
                }
            },
            Ok(Verdict::Unmatched) => {
                debug!(path = %path.display(), "no match");
                summary.unmatched += 1;
            }
            Ok(Verdict::Undecided) => {
                debug!(path = %path.display(), "no judgable content");
                summary.undecided += 1;
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "classification failed");
                summary.failed += 1;
            }
        }
    }

    info!(examined = summary.examined, matched = summary.matched,
        unmatched = summary.unmatched, undecided = summary.undecided,
        failed = summary.failed, "triage complete");
    Ok(summary)
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}

async fn classify_file(client: &VisionClient, path: &Path, ext: &str) -> Result<Verdict> {
    if ext == "pdf" {
        // Text-bearing PDFs are judged on their text. Scanned PDFs come back
        // empty and stay where they are for a manual pass.
        let text = tokio::task::spawn_blocking({
            let path = path.to_path_buf();
            move || pdf_extract::extract_text(&path)
        })
        .await
        .map_err(|e| crate::error::TriageError::ExtractionError(e.to_string()))?
        .map_err(|e| crate::error::TriageError::ExtractionError(e.to_string()))?;

        if text.trim().is_empty() {
            return Ok(Verdict::Undecided);
        }
        return match client.classify_text(&text).await? {
            true => Ok(Verdict::Matched),
            false => Ok(Verdict::Unmatched),
        };
    }

    let bytes = fs::read(path)?;
    match client.classify_image(&bytes).await? {
        true => Ok(Verdict::Matched),
        false => Ok(Verdict::Unmatched),
    }
}

/// Move a file into `dest_dir`, falling back to copy+remove across devices.
fn move_into(path: &Path, dest_dir: &Path) -> std::io::Result<PathBuf> {
    let file_name = path.file_name().expect("walked entries have file names");
    let dest = dest_dir.join(file_name);

    if fs::rename(path, &dest).is_err() {
        fs::copy(path, &dest)?;
        fs::remove_file(path)?;
    }
    Ok(dest)
}
