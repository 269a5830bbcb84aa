use crate::discover::DiscoverySource;
use crate::extract::{IdExtractor, ItemId};
use crate::materialize::Materializer;
use crate::store::ProcessedLedger;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Callback for human-readable progress lines.
pub type ProgressCallback = Arc<dyn Fn(String) + Send + Sync>;

/// Callback for per-item outcomes as they settle.
pub type ItemCallback = Arc<dyn Fn(&ItemId, &ItemOutcome) + Send + Sync>;

/// What happened to one candidate during the downloading stage.
#[derive(Debug, Clone)]
pub enum ItemOutcome {
    Saved { path: PathBuf },
    Skipped,
    Failed,
}

/// The goal of one run: a query, how many new items to materialize, and how
/// many related items to pull per main-tier item (0 disables the tier).
#[derive(Debug, Clone)]
pub struct Target {
    pub query: String,
    pub count: usize,
    pub related_per_item: usize,
}

/// Whether an artifact already present on disk counts as a duplicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExistingFilePolicy {
    /// A file at the deterministic artifact path means the item was handled.
    Authoritative,
    /// Only the processed ledger decides; files on disk are overwritten.
    Ignore,
}

#[derive(Debug, Clone)]
pub struct FrontierConfig {
    /// Discovery collects up to `count * overfetch_factor` distinct IDs so a
    /// duplicate-heavy query still converts `count` new items.
    pub overfetch_factor: usize,
    /// Cap on main-tier discovery passes.
    pub max_passes: usize,
    /// Cap on discovery passes per related-tier item.
    pub related_max_passes: usize,
    /// Stop discovery after this many consecutive passes with no new IDs.
    pub stable_cutoff: usize,
    /// Materializations run in batches of at most this many concurrent fetches.
    pub batch_size: usize,
    /// Pause between materialization batches.
    pub batch_pause: Duration,
    pub existing_file_policy: ExistingFilePolicy,
}

impl Default for FrontierConfig {
    fn default() -> Self {
        Self {
            overfetch_factor: 3,
            max_passes: 20,
            related_max_passes: 15,
            stable_cutoff: 3,
            batch_size: 5,
            batch_pause: Duration::from_millis(500),
            existing_file_policy: ExistingFilePolicy::Authoritative,
        }
    }
}

/// Lifecycle stages of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Searching,
    Expanding,
    Downloading,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Searching => "searching",
            Stage::Expanding => "expanding",
            Stage::Downloading => "downloading",
            Stage::Done => "done",
        };
        f.write_str(s)
    }
}

/// End-of-run counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Distinct main-tier IDs discovered.
    pub found: usize,
    /// Distinct IDs added by the related tier.
    pub expanded: usize,
    /// Candidates skipped as duplicates (ledger, session, or existing file).
    pub skipped: usize,
    /// Newly materialized items.
    pub succeeded: usize,
    /// Materialization attempts that failed (eligible for retry next run).
    pub failed: usize,
}

/// The incremental crawl-and-dedup frontier.
///
/// Owns everything mutable for the lifetime of one run: the session-seen set,
/// the processed ledger handle, and the collaborator handles. Discovery
/// halting policy (pass caps, stability cutoff, over-fetch goal) lives here
/// and only here; sources just report what a pass can see.
pub struct Frontier {
    source: Arc<dyn DiscoverySource>,
    materializer: Arc<dyn Materializer>,
    extractor: IdExtractor,
    ledger: ProcessedLedger,
    session_seen: HashSet<ItemId>,
    config: FrontierConfig,
    progress_callback: Option<ProgressCallback>,
    item_callback: Option<ItemCallback>,
}

impl Frontier {
    pub fn new(
        source: Arc<dyn DiscoverySource>,
        materializer: Arc<dyn Materializer>,
        extractor: IdExtractor,
        ledger: ProcessedLedger,
    ) -> Self {
        Self {
            source,
            materializer,
            extractor,
            ledger,
            session_seen: HashSet::new(),
            config: FrontierConfig::default(),
            progress_callback: None,
            item_callback: None,
        }
    }

    pub fn with_config(mut self, config: FrontierConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn with_item_callback(mut self, callback: ItemCallback) -> Self {
        self.item_callback = Some(callback);
        self
    }

    pub fn ledger(&self) -> &ProcessedLedger {
        &self.ledger
    }

    fn progress(&self, msg: String) {
        if let Some(ref cb) = self.progress_callback {
            cb(msg);
        }
    }

    fn emit(&self, id: &ItemId, outcome: &ItemOutcome) {
        if let Some(ref cb) = self.item_callback {
            cb(id, outcome);
        }
    }

    /// Execute one full run against `target`.
    ///
    /// Per-candidate and per-item failures are absorbed into the summary;
    /// nothing escapes the loop bodies. A run with nothing to discover simply
    /// reports zeros.
    pub async fn run(&mut self, target: &Target) -> RunSummary {
        let mut summary = RunSummary::default();

        if target.count == 0 {
            info!(query = %target.query, "target count is 0, nothing to do");
            return summary;
        }

        info!(query = %target.query, count = target.count, related = target.related_per_item,
            processed = self.ledger.len(), "starting run");

        // Insertion-ordered working list; `discovered` keys it (first-seen wins).
        let mut working: Vec<ItemId> = Vec::new();
        let mut discovered: HashSet<ItemId> = HashSet::new();

        self.search(target, &mut working, &mut discovered).await;
        summary.found = working.len();

        if working.is_empty() {
            info!(query = %target.query, "no candidates discovered");
            self.progress(format!("{}: no candidates for '{}'", Stage::Done, target.query));
            return summary;
        }

        if target.related_per_item > 0 {
            summary.expanded = self.expand(target, &mut working, &mut discovered).await;
        }

        self.download(target, &working, &mut summary).await;

        info!(stage = %Stage::Done, found = summary.found, expanded = summary.expanded,
            skipped = summary.skipped, succeeded = summary.succeeded, failed = summary.failed,
            "run complete");
        summary
    }

    /// SEARCHING: accumulate distinct main-tier IDs up to the over-fetch goal.
    async fn search(
        &mut self,
        target: &Target,
        working: &mut Vec<ItemId>,
        discovered: &mut HashSet<ItemId>,
    ) {
        let goal = target.count.saturating_mul(self.config.overfetch_factor.max(1));
        info!(stage = %Stage::Searching, goal, "discovering candidates");

        let mut pass_no = 0;
        let mut stagnant = 0;
        while working.len() < goal
            && pass_no < self.config.max_passes
            && stagnant < self.config.stable_cutoff
        {
            let urls = match self.source.pass(&target.query, pass_no).await {
                Ok(urls) => urls,
                Err(e) => {
                    warn!(pass = pass_no, error = %e,
                        "discovery pass failed, continuing with candidates collected so far");
                    break;
                }
            };

            let before = working.len();
            for url in urls {
                if let Some(id) = self.extractor.extract(&url)
                    && discovered.insert(id.clone())
                {
                    working.push(id);
                    if working.len() >= goal {
                        break;
                    }
                }
            }

            stagnant = if working.len() == before { stagnant + 1 } else { 0 };
            pass_no += 1;
            debug!(pass = pass_no, candidates = working.len(), stagnant, "discovery pass done");
            self.progress(format!(
                "{}: pass {} found {} candidates",
                Stage::Searching,
                pass_no,
                working.len()
            ));
        }
    }

    /// EXPANDING: pull up to `related_per_item` related IDs for each of the
    /// first `count` main-tier items. Returns how many new IDs were added to
    /// the working list.
    async fn expand(
        &mut self,
        target: &Target,
        working: &mut Vec<ItemId>,
        discovered: &mut HashSet<ItemId>,
    ) -> usize {
        let mains: Vec<ItemId> = working.iter().take(target.count).cloned().collect();
        info!(stage = %Stage::Expanding, items = mains.len(), per_item = target.related_per_item,
            "expanding related tier");

        let mut added_total = 0;
        for (i, main) in mains.iter().enumerate() {
            self.progress(format!(
                "{}: item {}/{} ({})",
                Stage::Expanding,
                i + 1,
                mains.len(),
                main
            ));

            // Per-item quota counts distinct related IDs for this item, even
            // ones the working list already holds; only genuinely new ones
            // join the list.
            let mut local: HashSet<ItemId> = HashSet::new();
            let mut pass_no = 0;
            let mut stagnant = 0;
            while local.len() < target.related_per_item
                && pass_no < self.config.related_max_passes
                && stagnant < self.config.stable_cutoff
            {
                let urls = match self.source.related_pass(main, pass_no).await {
                    Ok(urls) => urls,
                    Err(e) => {
                        warn!(id = %main, pass = pass_no, error = %e,
                            "related discovery pass failed, moving to next item");
                        break;
                    }
                };

                let before = local.len();
                for url in urls {
                    if let Some(id) = self.extractor.extract(&url) {
                        if id == *main || !local.insert(id.clone()) {
                            continue;
                        }
                        if discovered.insert(id.clone()) {
                            working.push(id);
                            added_total += 1;
                        }
                        if local.len() >= target.related_per_item {
                            break;
                        }
                    }
                }

                stagnant = if local.len() == before { stagnant + 1 } else { 0 };
                pass_no += 1;
            }
            debug!(id = %main, related = local.len(), "expansion done for item");
        }
        added_total
    }

    /// DOWNLOADING: materialize survivors in bounded batches until the
    /// success goal is reached or the working list is exhausted. Candidates
    /// left unattempted when the goal lands early stay untouched.
    async fn download(&mut self, target: &Target, working: &[ItemId], summary: &mut RunSummary) {
        let goal = if target.related_per_item > 0 {
            target.count.saturating_mul(1 + target.related_per_item)
        } else {
            target.count
        };
        info!(stage = %Stage::Downloading, goal, candidates = working.len(), "materializing");

        let mut idx = 0;
        while summary.succeeded < goal && idx < working.len() {
            let remaining = goal - summary.succeeded;
            let batch_cap = self.config.batch_size.max(1).min(remaining);

            let mut batch: Vec<ItemId> = Vec::new();
            while batch.len() < batch_cap && idx < working.len() {
                let id = &working[idx];
                idx += 1;

                if self.ledger.contains(id) || self.session_seen.contains(id) {
                    debug!(id = %id, "skipping duplicate (already processed)");
                    summary.skipped += 1;
                    self.emit(id, &ItemOutcome::Skipped);
                    continue;
                }
                if self.config.existing_file_policy == ExistingFilePolicy::Authoritative
                    && self.materializer.artifact_path(id).exists()
                {
                    debug!(id = %id, "skipping duplicate (artifact already on disk)");
                    summary.skipped += 1;
                    self.emit(id, &ItemOutcome::Skipped);
                    continue;
                }
                batch.push(id.clone());
            }

            if batch.is_empty() {
                continue;
            }

            self.progress(format!(
                "{}: fetching {} items ({}/{} new so far)",
                Stage::Downloading,
                batch.len(),
                summary.succeeded,
                goal
            ));

            let futures = batch.iter().map(|id| {
                let materializer = Arc::clone(&self.materializer);
                let id = id.clone();
                async move { materializer.materialize(&id).await }
            });
            let results = join_all(futures).await;

            for (id, result) in batch.iter().zip(results) {
                match result {
                    Ok(artifact) => {
                        self.ledger.mark(id.clone());
                        self.session_seen.insert(id.clone());
                        summary.succeeded += 1;
                        info!(id = %id, path = %artifact.path.display(), bytes = artifact.bytes,
                            "materialized");
                        self.emit(id, &ItemOutcome::Saved { path: artifact.path });
                    }
                    Err(e) => {
                        summary.failed += 1;
                        warn!(id = %id, error = %e, "materialize failed, left for a future run");
                        self.emit(id, &ItemOutcome::Failed);
                    }
                }
            }

            if summary.succeeded < goal && idx < working.len() {
                tokio::time::sleep(self.config.batch_pause).await;
            }
        }
    }
}
