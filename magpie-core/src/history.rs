use magpie_scraper::frontier::RunSummary;
use rusqlite::{Connection, OptionalExtension, Result, params};
use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Persistent record of harvest runs and per-item outcomes.
pub struct RunHistory {
    conn: Connection,
}

#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: String,
    pub site: String,
    pub query: String,
    pub status: String,
    pub start_time: i64,
    pub end_time: Option<i64>,
    pub succeeded: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct ItemRecord {
    pub item_id: String,
    pub outcome: String,
    pub artifact_path: Option<String>,
}

fn current_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
}

impl RunHistory {
    pub fn drop(path: &Path) {
        fs::remove_file(path).unwrap();
    }
    pub fn exists(path: &Path) -> bool {
        path.exists()
    }
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // Optimize for concurrent writes
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA cache_size = -64000;  -- 64MB cache
            PRAGMA temp_store = MEMORY;
            PRAGMA foreign_keys = ON;
            ",
        )?;

        let db = RunHistory { conn };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            -- Harvest runs
            CREATE TABLE IF NOT EXISTS runs (
    id TEXT PRIMARY KEY,
    start_time INTEGER NOT NULL,
    end_time INTEGER,
    status TEXT NOT NULL CHECK(status IN ('running', 'completed', 'failed')),
    site TEXT NOT NULL CHECK(site IN ('pinterest', 'scribd')),
    query TEXT NOT NULL,
    target_count INTEGER NOT NULL,

    -- Summary counters, filled in on completion
    found INTEGER,
    expanded INTEGER,
    skipped INTEGER,
    succeeded INTEGER,
    failed INTEGER
);

-- Per-item outcomes
CREATE TABLE IF NOT EXISTS items (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id TEXT NOT NULL,
    item_id TEXT NOT NULL,
    outcome TEXT NOT NULL CHECK(outcome IN ('saved', 'skipped', 'failed')),
    artifact_path TEXT,
    recorded_at INTEGER NOT NULL,

    FOREIGN KEY(run_id) REFERENCES runs(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_items_run ON items(run_id);
CREATE INDEX IF NOT EXISTS idx_items_item ON items(item_id);
CREATE INDEX IF NOT EXISTS idx_items_outcome ON items(outcome);
CREATE INDEX IF NOT EXISTS idx_runs_site ON runs(site);
            ",
        )?;
        Ok(())
    }

    // Run management
    pub fn create_run(&self, site: &str, query: &str, target_count: usize) -> Result<String> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let timestamp = current_timestamp();

        self.conn.execute(
            "INSERT INTO runs (id, start_time, status, site, query, target_count) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![&run_id, timestamp, "running", site, query, target_count as i64],
        )?;

        Ok(run_id)
    }

    pub fn complete_run(&self, run_id: &str, summary: &RunSummary) -> Result<()> {
        let timestamp = current_timestamp();
        self.conn.execute(
            "UPDATE runs SET status = ?1, end_time = ?2, found = ?3, expanded = ?4,
                 skipped = ?5, succeeded = ?6, failed = ?7 WHERE id = ?8",
            params![
                "completed",
                timestamp,
                summary.found as i64,
                summary.expanded as i64,
                summary.skipped as i64,
                summary.succeeded as i64,
                summary.failed as i64,
                run_id,
            ],
        )?;
        Ok(())
    }

    pub fn fail_run(&self, run_id: &str) -> Result<()> {
        let timestamp = current_timestamp();
        self.conn.execute(
            "UPDATE runs SET status = ?1, end_time = ?2 WHERE id = ?3",
            params!["failed", timestamp, run_id],
        )?;
        Ok(())
    }

    // Item operations
    pub fn record_item(
        &self,
        run_id: &str,
        item_id: &str,
        outcome: &str,
        artifact_path: Option<&str>,
    ) -> Result<i64> {
        let timestamp = current_timestamp();

        self.conn.execute(
            "INSERT INTO items (run_id, item_id, outcome, artifact_path, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![run_id, item_id, outcome, artifact_path, timestamp],
        )?;

        Ok(self.conn.last_insert_rowid())
    }

    pub fn items_for_run(&self, run_id: &str) -> Result<Vec<ItemRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT item_id, outcome, artifact_path FROM items WHERE run_id = ?1 ORDER BY id",
        )?;

        let items = stmt
            .query_map(params![run_id], |row| {
                Ok(ItemRecord {
                    item_id: row.get(0)?,
                    outcome: row.get(1)?,
                    artifact_path: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>>>()?;

        Ok(items)
    }

    /// Whether any past run saved this item.
    pub fn was_saved(&self, item_id: &str) -> Result<bool> {
        let mut stmt = self
            .conn
            .prepare("SELECT 1 FROM items WHERE item_id = ?1 AND outcome = 'saved' LIMIT 1")?;

        let result: Option<i64> = stmt
            .query_row(params![item_id], |row| row.get(0))
            .optional()?;
        Ok(result.is_some())
    }

    pub fn outcome_counts(&self, run_id: &str) -> Result<Vec<(String, i64)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT outcome, COUNT(*) FROM items WHERE run_id = ?1 GROUP BY outcome")?;

        let counts = stmt
            .query_map(params![run_id], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>>>()?;

        Ok(counts)
    }

    pub fn recent_runs(&self, limit: usize) -> Result<Vec<RunRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, site, query, status, start_time, end_time, succeeded
             FROM runs ORDER BY start_time DESC LIMIT ?1",
        )?;

        let runs = stmt
            .query_map(params![limit as i64], |row| {
                Ok(RunRecord {
                    id: row.get(0)?,
                    site: row.get(1)?,
                    query: row.get(2)?,
                    status: row.get(3)?,
                    start_time: row.get(4)?,
                    end_time: row.get(5)?,
                    succeeded: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>>>()?;

        Ok(runs)
    }

    pub fn get_run(&self, run_id: &str) -> Result<Option<RunRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, site, query, status, start_time, end_time, succeeded
             FROM runs WHERE id = ?1",
        )?;

        let run = stmt
            .query_row(params![run_id], |row| {
                Ok(RunRecord {
                    id: row.get(0)?,
                    site: row.get(1)?,
                    query: row.get(2)?,
                    status: row.get(3)?,
                    start_time: row.get(4)?,
                    end_time: row.get(5)?,
                    succeeded: row.get(6)?,
                })
            })
            .optional()?;
        Ok(run)
    }
}
