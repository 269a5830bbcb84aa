// Tests for harvest orchestration

use async_trait::async_trait;
use magpie_core::harvest::{execute_harvest, HarvestOptions};
use magpie_core::history::RunHistory;
use magpie_scraper::error::Result;
use magpie_scraper::extract::{IdExtractor, ItemId};
use magpie_scraper::frontier::FrontierConfig;
use magpie_scraper::materialize::{write_artifact, Artifact, Materializer};
use magpie_scraper::store::ProcessedLedger;
use magpie_scraper::DiscoverySource;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

struct StaticSource {
    urls: Vec<String>,
}

#[async_trait]
impl DiscoverySource for StaticSource {
    async fn pass(&self, _query: &str, pass_no: usize) -> Result<Vec<String>> {
        if pass_no == 0 {
            Ok(self.urls.clone())
        } else {
            Ok(Vec::new())
        }
    }
}

struct DiskMaterializer {
    dir: PathBuf,
}

#[async_trait]
impl Materializer for DiskMaterializer {
    fn artifact_path(&self, id: &ItemId) -> PathBuf {
        self.dir.join(format!("{id}.bin"))
    }

    async fn materialize(&self, id: &ItemId) -> Result<Artifact> {
        write_artifact(id, &self.artifact_path(id), b"payload")
    }
}

fn test_options(query: &str, count: usize) -> HarvestOptions {
    HarvestOptions {
        site: "pinterest".to_string(),
        query: query.to_string(),
        count,
        related_per_item: 0,
        config: FrontierConfig {
            batch_pause: Duration::from_millis(0),
            ..FrontierConfig::default()
        },
        show_progress_bars: false,
    }
}

// ============================================================================
// Orchestration Tests
// ============================================================================

#[tokio::test]
async fn test_execute_harvest_records_history() {
    let tmp = TempDir::new().unwrap();
    let db = RunHistory::new(&tmp.path().join("test.db")).unwrap();

    let source = Arc::new(StaticSource {
        urls: vec![
            "https://example.com/pin/100000000001/".to_string(),
            "https://example.com/pin/100000000002/".to_string(),
            "https://example.com/pin/100000000003/".to_string(),
        ],
    });
    let materializer = Arc::new(DiskMaterializer { dir: tmp.path().to_path_buf() });
    let ledger = ProcessedLedger::load(tmp.path().join("processed.json"));

    let summary = execute_harvest(
        test_options("lamps", 2),
        source,
        materializer,
        IdExtractor::new("pin"),
        ledger,
        Some(&db),
        None,
    )
    .await
    .unwrap();

    assert_eq!(summary.succeeded, 2);

    let runs = db.recent_runs(10).unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, "completed");
    assert_eq!(runs[0].query, "lamps");
    assert_eq!(runs[0].succeeded, Some(2));

    let items = db.items_for_run(&runs[0].id).unwrap();
    assert_eq!(items.len(), 2);
    assert!(items.iter().all(|i| i.outcome == "saved"));
    assert!(items[0].artifact_path.as_deref().unwrap().ends_with(".bin"));
    assert!(db.was_saved("100000000001").unwrap());
}

#[tokio::test]
async fn test_execute_harvest_without_history() {
    let tmp = TempDir::new().unwrap();

    let source = Arc::new(StaticSource {
        urls: vec!["https://example.com/pin/100000000001/".to_string()],
    });
    let materializer = Arc::new(DiskMaterializer { dir: tmp.path().to_path_buf() });
    let ledger = ProcessedLedger::load(tmp.path().join("processed.json"));

    let summary = execute_harvest(
        test_options("lamps", 1),
        source,
        materializer,
        IdExtractor::new("pin"),
        ledger,
        None,
        None,
    )
    .await
    .unwrap();

    assert_eq!(summary.succeeded, 1);
}

#[tokio::test]
async fn test_execute_harvest_forwards_progress() {
    let tmp = TempDir::new().unwrap();

    let source = Arc::new(StaticSource {
        urls: vec!["https://example.com/pin/100000000001/".to_string()],
    });
    let materializer = Arc::new(DiskMaterializer { dir: tmp.path().to_path_buf() });
    let ledger = ProcessedLedger::load(tmp.path().join("processed.json"));

    let messages: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let messages_clone = messages.clone();
    let callback = Arc::new(move |msg: String| {
        messages_clone.lock().unwrap().push(msg);
    });

    execute_harvest(
        test_options("lamps", 1),
        source,
        materializer,
        IdExtractor::new("pin"),
        ledger,
        None,
        Some(callback),
    )
    .await
    .unwrap();

    assert!(!messages.lock().unwrap().is_empty());
}
