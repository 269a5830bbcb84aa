use crate::history::RunHistory;
use indicatif::{ProgressBar, ProgressStyle};
use magpie_scraper::extract::{IdExtractor, ItemId};
use magpie_scraper::frontier::{
    Frontier, FrontierConfig, ItemOutcome, ProgressCallback, RunSummary, Target,
};
use magpie_scraper::materialize::Materializer;
use magpie_scraper::store::ProcessedLedger;
use magpie_scraper::DiscoverySource;
use std::sync::{Arc, Mutex as StdMutex};

/// Options for configuring a harvest run
pub struct HarvestOptions {
    /// Site label recorded in run history ("pinterest" or "scribd").
    pub site: String,
    pub query: String,
    pub count: usize,
    pub related_per_item: usize,
    pub config: FrontierConfig,
    pub show_progress_bars: bool,
}

/// Callback for reporting harvest progress
pub type HarvestProgressCallback = Arc<dyn Fn(String) + Send + Sync>;

/// Execute a harvest with the given options and collaborators.
/// Returns the run summary.
pub async fn execute_harvest(
    options: HarvestOptions,
    source: Arc<dyn DiscoverySource>,
    materializer: Arc<dyn Materializer>,
    extractor: IdExtractor,
    ledger: ProcessedLedger,
    history: Option<&RunHistory>,
    progress_callback: Option<HarvestProgressCallback>,
) -> Result<RunSummary, String> {
    let HarvestOptions {
        site,
        query,
        count,
        related_per_item,
        config,
        show_progress_bars,
    } = options;

    // Set up single progress bar for overall harvest progress (only if enabled)
    let progress_bar = if show_progress_bars {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap(),
        );
        pb.set_message("Starting harvest...");
        Some(Arc::new(pb))
    } else {
        None
    };

    let run_id = match history {
        Some(h) => Some(
            h.create_run(&site, &query, count)
                .map_err(|e| format!("Failed to create run record: {e}"))?,
        ),
        None => None,
    };

    // Item outcomes buffer up during the run; history sees them afterwards
    // because the SQLite connection is not shareable across the callback.
    let events: Arc<StdMutex<Vec<(ItemId, ItemOutcome)>>> = Arc::new(StdMutex::new(Vec::new()));
    let events_clone = events.clone();
    let item_callback = Arc::new(move |id: &ItemId, outcome: &ItemOutcome| {
        events_clone.lock().unwrap().push((id.clone(), outcome.clone()));
    });

    // Progress callback feeds the spinner and any caller-provided callback
    let internal_progress_callback: ProgressCallback = {
        let pb_clone = progress_bar.clone();
        let caller_callback = progress_callback.clone();
        Arc::new(move |msg: String| {
            if let Some(ref pb) = pb_clone {
                pb.set_message(msg.clone());
                pb.tick();
            }
            if let Some(ref cb) = caller_callback {
                cb(msg);
            }
        })
    };

    let mut frontier = Frontier::new(source, materializer, extractor, ledger)
        .with_config(config)
        .with_progress_callback(internal_progress_callback)
        .with_item_callback(item_callback);

    let target = Target { query, count, related_per_item };
    let summary = frontier.run(&target).await;

    // Finish progress bar (only if enabled)
    if let Some(ref pb) = progress_bar {
        pb.finish_with_message(format!(
            "Harvest complete! {} new items, {} duplicates skipped",
            summary.succeeded, summary.skipped
        ));
    }

    if let (Some(h), Some(ref run_id)) = (history, run_id) {
        for (id, outcome) in events.lock().unwrap().iter() {
            let (outcome_str, path) = match outcome {
                ItemOutcome::Saved { path } => ("saved", Some(path.to_string_lossy().into_owned())),
                ItemOutcome::Skipped => ("skipped", None),
                ItemOutcome::Failed => ("failed", None),
            };
            if let Err(e) = h.record_item(run_id, id.as_str(), outcome_str, path.as_deref()) {
                let _ = h.fail_run(run_id);
                return Err(format!("Failed to record item outcome: {e}"));
            }
        }
        h.complete_run(run_id, &summary)
            .map_err(|e| format!("Failed to complete run record: {e}"))?;
    }

    Ok(summary)
}

/// Generate a short post-run summary block
pub fn generate_harvest_summary(summary: &RunSummary) -> String {
    let mut report = String::new();
    report.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");
    report.push_str("# Summary:\n");
    report.push_str(&format!("  Candidates found: {}\n", summary.found));
    if summary.expanded > 0 {
        report.push_str(&format!("  Related items added: {}\n", summary.expanded));
    }
    report.push_str(&format!("  New items saved: {}\n", summary.succeeded));
    report.push_str(&format!("  Duplicates skipped: {}\n", summary.skipped));
    report.push_str(&format!("  Failures: {}\n", summary.failed));
    report.push_str("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_block_mentions_every_counter() {
        let summary = RunSummary {
            found: 12,
            expanded: 4,
            skipped: 3,
            succeeded: 8,
            failed: 1,
        };
        let report = generate_harvest_summary(&summary);
        assert!(report.contains("Candidates found: 12"));
        assert!(report.contains("Related items added: 4"));
        assert!(report.contains("New items saved: 8"));
        assert!(report.contains("Duplicates skipped: 3"));
        assert!(report.contains("Failures: 1"));
    }

    #[test]
    fn related_line_is_omitted_when_expansion_is_off() {
        let report = generate_harvest_summary(&RunSummary::default());
        assert!(!report.contains("Related items added"));
    }
}
