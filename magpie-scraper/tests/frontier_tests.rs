use async_trait::async_trait;
use magpie_scraper::error::{Result, ScrapeError};
use magpie_scraper::extract::{IdExtractor, ItemId};
use magpie_scraper::frontier::{ExistingFilePolicy, Frontier, FrontierConfig, Target};
use magpie_scraper::materialize::{write_artifact, Artifact, Materializer};
use magpie_scraper::store::ProcessedLedger;
use magpie_scraper::DiscoverySource;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

fn pin_url(n: u64) -> String {
    format!("https://example.com/pin/10000000000{n}/")
}

fn pin_id(n: u64) -> ItemId {
    ItemId::from(format!("10000000000{n}").as_str())
}

/// Scripted discovery source. `pages[n]` is what pass `n` can see; passes
/// beyond the script either repeat the last page or come back empty.
struct FakeSource {
    pages: Vec<Vec<String>>,
    repeat_last: bool,
    fail_from_pass: Option<usize>,
    related: HashMap<ItemId, Vec<String>>,
    related_fail: HashSet<ItemId>,
    pass_calls: AtomicUsize,
}

impl FakeSource {
    fn new(pages: Vec<Vec<String>>) -> Self {
        Self {
            pages,
            repeat_last: false,
            fail_from_pass: None,
            related: HashMap::new(),
            related_fail: HashSet::new(),
            pass_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl DiscoverySource for FakeSource {
    async fn pass(&self, _query: &str, pass_no: usize) -> Result<Vec<String>> {
        self.pass_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_from_pass.is_some_and(|n| pass_no >= n) {
            return Err(ScrapeError::RenderError {
                status: 500,
                message: "render crashed".into(),
            });
        }
        let idx = if self.repeat_last && !self.pages.is_empty() {
            pass_no.min(self.pages.len() - 1)
        } else {
            pass_no
        };
        Ok(self.pages.get(idx).cloned().unwrap_or_default())
    }

    async fn related_pass(&self, id: &ItemId, pass_no: usize) -> Result<Vec<String>> {
        if self.related_fail.contains(id) {
            return Err(ScrapeError::RenderError {
                status: 500,
                message: "render crashed".into(),
            });
        }
        if pass_no == 0 {
            Ok(self.related.get(id).cloned().unwrap_or_default())
        } else {
            Ok(Vec::new())
        }
    }
}

/// Writes a tiny artifact per item, or fails for scripted IDs.
struct FakeMaterializer {
    dir: PathBuf,
    fail: HashSet<ItemId>,
    attempts: Mutex<Vec<ItemId>>,
}

impl FakeMaterializer {
    fn new(dir: PathBuf) -> Self {
        Self { dir, fail: HashSet::new(), attempts: Mutex::new(Vec::new()) }
    }

    fn attempts(&self) -> Vec<ItemId> {
        self.attempts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Materializer for FakeMaterializer {
    fn artifact_path(&self, id: &ItemId) -> PathBuf {
        self.dir.join(format!("{id}.bin"))
    }

    async fn materialize(&self, id: &ItemId) -> Result<Artifact> {
        self.attempts.lock().unwrap().push(id.clone());
        if self.fail.contains(id) {
            return Err(ScrapeError::Other(format!("scripted failure for {id}")));
        }
        write_artifact(id, &self.artifact_path(id), b"artifact")
    }
}

fn quick_config() -> FrontierConfig {
    FrontierConfig { batch_pause: Duration::from_millis(0), ..FrontierConfig::default() }
}

fn build_frontier(
    source: Arc<FakeSource>,
    materializer: Arc<FakeMaterializer>,
    ledger: ProcessedLedger,
) -> Frontier {
    Frontier::new(source, materializer, IdExtractor::new("pin"), ledger)
        .with_config(quick_config())
}

#[tokio::test]
async fn converges_on_new_items_despite_known_duplicates() {
    let tmp = TempDir::new().unwrap();
    let ledger_path = tmp.path().join("processed.json");

    // Items 1 and 2 were materialized by an earlier run.
    let mut seeded = ProcessedLedger::load(&ledger_path);
    seeded.mark(pin_id(1));
    seeded.mark(pin_id(2));

    let source = Arc::new(FakeSource::new(vec![(1..=9).map(pin_url).collect()]));
    let materializer = Arc::new(FakeMaterializer::new(tmp.path().to_path_buf()));
    let mut frontier = build_frontier(
        source,
        Arc::clone(&materializer),
        ProcessedLedger::load(&ledger_path),
    );

    let summary = frontier
        .run(&Target { query: "q".into(), count: 3, related_per_item: 0 })
        .await;

    assert_eq!(summary.found, 9);
    assert_eq!(summary.skipped, 2);
    assert_eq!(summary.succeeded, 3);
    assert_eq!(summary.failed, 0);

    // The three items after the duplicates, and nothing past the goal.
    assert_eq!(materializer.attempts(), vec![pin_id(3), pin_id(4), pin_id(5)]);
    assert!(materializer.artifact_path(&pin_id(5)).exists());
    assert!(!materializer.artifact_path(&pin_id(6)).exists());
}

#[tokio::test]
async fn repeated_runs_advance_through_the_pool_then_go_quiet() {
    let tmp = TempDir::new().unwrap();
    let ledger_path = tmp.path().join("processed.json");
    let pages: Vec<Vec<String>> = vec![(1..=4).map(pin_url).collect()];

    let mut totals = Vec::new();
    for _ in 0..3 {
        let source = Arc::new(FakeSource::new(pages.clone()));
        let materializer = Arc::new(FakeMaterializer::new(tmp.path().to_path_buf()));
        let mut frontier =
            build_frontier(source, materializer, ProcessedLedger::load(&ledger_path));
        let summary = frontier
            .run(&Target { query: "q".into(), count: 2, related_per_item: 0 })
            .await;
        totals.push((summary.succeeded, summary.skipped));
    }

    assert_eq!(totals, vec![(2, 0), (2, 2), (0, 4)]);
    assert_eq!(ProcessedLedger::load(&ledger_path).len(), 4);
}

#[tokio::test]
async fn existing_artifact_counts_as_duplicate_under_authoritative_policy() {
    let tmp = TempDir::new().unwrap();
    let ledger_path = tmp.path().join("processed.json");

    let source = Arc::new(FakeSource::new(vec![vec![pin_url(1), pin_url(2)]]));
    let materializer = Arc::new(FakeMaterializer::new(tmp.path().to_path_buf()));
    std::fs::write(materializer.artifact_path(&pin_id(1)), b"already here").unwrap();

    let mut frontier = build_frontier(
        source,
        Arc::clone(&materializer),
        ProcessedLedger::load(&ledger_path),
    );
    let summary = frontier
        .run(&Target { query: "q".into(), count: 2, related_per_item: 0 })
        .await;

    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(materializer.attempts(), vec![pin_id(2)]);
}

#[tokio::test]
async fn ignore_policy_rematerializes_over_existing_files() {
    let tmp = TempDir::new().unwrap();
    let ledger_path = tmp.path().join("processed.json");

    let source = Arc::new(FakeSource::new(vec![vec![pin_url(1)]]));
    let materializer = Arc::new(FakeMaterializer::new(tmp.path().to_path_buf()));
    std::fs::write(materializer.artifact_path(&pin_id(1)), b"stale").unwrap();

    let config = FrontierConfig {
        existing_file_policy: ExistingFilePolicy::Ignore,
        ..quick_config()
    };
    let mut frontier = Frontier::new(
        source,
        Arc::clone(&materializer) as Arc<dyn Materializer>,
        IdExtractor::new("pin"),
        ProcessedLedger::load(&ledger_path),
    )
    .with_config(config);

    let summary = frontier
        .run(&Target { query: "q".into(), count: 1, related_per_item: 0 })
        .await;

    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.skipped, 0);
    assert_eq!(
        std::fs::read(materializer.artifact_path(&pin_id(1))).unwrap(),
        b"artifact"
    );
}

#[tokio::test]
async fn zero_count_does_nothing() {
    let tmp = TempDir::new().unwrap();
    let source = Arc::new(FakeSource::new(vec![vec![pin_url(1)]]));
    let materializer = Arc::new(FakeMaterializer::new(tmp.path().to_path_buf()));
    let mut frontier = build_frontier(
        Arc::clone(&source),
        Arc::clone(&materializer),
        ProcessedLedger::load(tmp.path().join("processed.json")),
    );

    let summary = frontier
        .run(&Target { query: "q".into(), count: 0, related_per_item: 0 })
        .await;

    assert_eq!(summary, Default::default());
    assert_eq!(source.pass_calls.load(Ordering::SeqCst), 0);
    assert!(materializer.attempts().is_empty());
}

#[tokio::test]
async fn empty_discovery_reports_zeros() {
    let tmp = TempDir::new().unwrap();
    let source = Arc::new(FakeSource::new(Vec::new()));
    let materializer = Arc::new(FakeMaterializer::new(tmp.path().to_path_buf()));
    let mut frontier = build_frontier(
        source,
        Arc::clone(&materializer),
        ProcessedLedger::load(tmp.path().join("processed.json")),
    );

    let summary = frontier
        .run(&Target { query: "nothing matches".into(), count: 5, related_per_item: 0 })
        .await;

    assert_eq!(summary, Default::default());
    assert!(materializer.attempts().is_empty());
}

#[tokio::test]
async fn stable_passes_cut_discovery_short() {
    let tmp = TempDir::new().unwrap();
    // Same page forever: one productive pass, then three stagnant ones.
    let mut source = FakeSource::new(vec![vec![pin_url(1), pin_url(2)]]);
    source.repeat_last = true;
    let source = Arc::new(source);

    let materializer = Arc::new(FakeMaterializer::new(tmp.path().to_path_buf()));
    let mut frontier = build_frontier(
        Arc::clone(&source),
        materializer,
        ProcessedLedger::load(tmp.path().join("processed.json")),
    );

    let summary = frontier
        .run(&Target { query: "q".into(), count: 10, related_per_item: 0 })
        .await;

    assert_eq!(summary.found, 2);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(source.pass_calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn discovery_failure_keeps_what_earlier_passes_collected() {
    let tmp = TempDir::new().unwrap();
    // Pass 0 is productive; every later pass dies at the render service.
    let mut source = FakeSource::new(vec![vec![pin_url(1), pin_url(2)]]);
    source.fail_from_pass = Some(1);
    let source = Arc::new(source);

    let materializer = Arc::new(FakeMaterializer::new(tmp.path().to_path_buf()));
    let mut frontier = build_frontier(
        Arc::clone(&source),
        Arc::clone(&materializer),
        ProcessedLedger::load(tmp.path().join("processed.json")),
    );

    let summary = frontier
        .run(&Target { query: "q".into(), count: 4, related_per_item: 0 })
        .await;

    // Discovery is abandoned, not the run: the pass-0 candidates still land.
    assert_eq!(source.pass_calls.load(Ordering::SeqCst), 2);
    assert_eq!(summary.found, 2);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 0);
    assert_eq!(materializer.attempts(), vec![pin_id(1), pin_id(2)]);
}

#[tokio::test]
async fn related_failure_moves_on_to_the_next_item() {
    let tmp = TempDir::new().unwrap();
    let mut source = FakeSource::new(vec![vec![pin_url(1), pin_url(2)]]);
    // Item 1's related page cannot be rendered; item 2's can.
    source.related_fail.insert(pin_id(1));
    source.related.insert(pin_id(2), vec![pin_url(3)]);
    let source = Arc::new(source);

    let materializer = Arc::new(FakeMaterializer::new(tmp.path().to_path_buf()));
    let mut frontier = build_frontier(
        source,
        Arc::clone(&materializer),
        ProcessedLedger::load(tmp.path().join("processed.json")),
    );

    let summary = frontier
        .run(&Target { query: "q".into(), count: 2, related_per_item: 1 })
        .await;

    assert_eq!(summary.found, 2);
    assert_eq!(summary.expanded, 1);
    assert_eq!(summary.succeeded, 3);
    assert_eq!(summary.failed, 0);
    assert!(materializer.attempts().contains(&pin_id(3)));
}

#[tokio::test]
async fn failures_are_counted_and_left_for_the_next_run() {
    let tmp = TempDir::new().unwrap();
    let ledger_path = tmp.path().join("processed.json");
    let pages: Vec<Vec<String>> = vec![(1..=3).map(pin_url).collect()];

    let source = Arc::new(FakeSource::new(pages.clone()));
    let mut materializer = FakeMaterializer::new(tmp.path().to_path_buf());
    materializer.fail.insert(pin_id(2));
    let materializer = Arc::new(materializer);

    let mut frontier = build_frontier(
        source,
        Arc::clone(&materializer),
        ProcessedLedger::load(&ledger_path),
    );
    let summary = frontier
        .run(&Target { query: "q".into(), count: 3, related_per_item: 0 })
        .await;

    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 1);

    // The failed item never reaches the ledger, so a clean run retries it.
    let reloaded = ProcessedLedger::load(&ledger_path);
    assert!(!reloaded.contains(&pin_id(2)));
    assert!(reloaded.contains(&pin_id(1)));

    let source = Arc::new(FakeSource::new(pages));
    let retry_materializer = Arc::new(FakeMaterializer::new(tmp.path().to_path_buf()));
    let mut frontier = build_frontier(source, Arc::clone(&retry_materializer), reloaded);
    frontier
        .run(&Target { query: "q".into(), count: 1, related_per_item: 0 })
        .await;
    assert_eq!(retry_materializer.attempts(), vec![pin_id(2)]);
}

#[tokio::test]
async fn related_tier_raises_the_goal_and_feeds_the_working_set() {
    let tmp = TempDir::new().unwrap();
    let mut source = FakeSource::new(vec![vec![pin_url(1), pin_url(2)]]);
    // Item 1 links to 3 and 4; item 2 links back to 3 (collapses) and to 5.
    source.related.insert(pin_id(1), vec![pin_url(3), pin_url(4)]);
    source.related.insert(pin_id(2), vec![pin_url(3), pin_url(5)]);
    let source = Arc::new(source);

    let materializer = Arc::new(FakeMaterializer::new(tmp.path().to_path_buf()));
    let mut frontier = build_frontier(
        source,
        Arc::clone(&materializer),
        ProcessedLedger::load(tmp.path().join("processed.json")),
    );

    let summary = frontier
        .run(&Target { query: "q".into(), count: 2, related_per_item: 2 })
        .await;

    assert_eq!(summary.found, 2);
    assert_eq!(summary.expanded, 3);
    // Goal is count * (1 + related_per_item) = 6, but only 5 exist.
    assert_eq!(summary.succeeded, 5);
    assert_eq!(summary.failed, 0);
}

#[tokio::test]
async fn batch_never_overshoots_the_remaining_goal() {
    let tmp = TempDir::new().unwrap();
    let source = Arc::new(FakeSource::new(vec![(1..=9).map(pin_url).collect()]));
    let materializer = Arc::new(FakeMaterializer::new(tmp.path().to_path_buf()));
    let mut frontier = build_frontier(
        source,
        Arc::clone(&materializer),
        ProcessedLedger::load(tmp.path().join("processed.json")),
    );

    let summary = frontier
        .run(&Target { query: "q".into(), count: 2, related_per_item: 0 })
        .await;

    // With a batch size of 5 and a goal of 2, only 2 fetches happen.
    assert_eq!(summary.succeeded, 2);
    assert_eq!(materializer.attempts().len(), 2);
}
