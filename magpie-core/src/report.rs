// Report generation from the run history database

use crate::history::RunHistory;
use rusqlite::Result;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ReportFormat {
    Text,
    Json,
    Markdown,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            "markdown" | "md" => Some(ReportFormat::Markdown),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportData {
    pub run_id: String,
    pub site: String,
    pub query: String,
    pub status: String,
    pub start_time: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<i64>,
    pub outcome_counts: OutcomeCounts,
    pub items: Vec<ItemData>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemData {
    pub item_id: String,
    pub outcome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutcomeCounts {
    pub saved: i64,
    pub skipped: i64,
    pub failed: i64,
}

pub fn gather_report_data(history: &RunHistory, run_id: &str) -> Result<ReportData> {
    let run = history
        .get_run(run_id)?
        .ok_or(rusqlite::Error::QueryReturnedNoRows)?;

    let mut outcome_counts = OutcomeCounts { saved: 0, skipped: 0, failed: 0 };
    for (outcome, count) in history.outcome_counts(run_id)? {
        match outcome.as_str() {
            "saved" => outcome_counts.saved = count,
            "skipped" => outcome_counts.skipped = count,
            "failed" => outcome_counts.failed = count,
            _ => {}
        }
    }

    let items = history
        .items_for_run(run_id)?
        .into_iter()
        .map(|item| ItemData {
            item_id: item.item_id,
            outcome: item.outcome,
            artifact_path: item.artifact_path,
        })
        .collect();

    Ok(ReportData {
        run_id: run.id,
        site: run.site,
        query: run.query,
        status: run.status,
        start_time: run.start_time,
        end_time: run.end_time,
        outcome_counts,
        items,
    })
}

pub fn generate_text_report(data: &ReportData) -> String {
    let mut report = String::new();

    // Header
    report.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");
    report.push_str("                          MAGPIE HARVEST REPORT\n");
    report.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");

    // Run info
    report.push_str(&format!("Run ID:       {}\n", data.run_id));
    report.push_str(&format!("Site:         {}\n", data.site));
    report.push_str(&format!("Query:        {}\n", data.query));
    report.push_str(&format!("Status:       {}\n", data.status_to_string()));
    report.push_str(&format!(
        "Run Date:     {}\n",
        data.format_timestamp(data.start_time)
    ));

    if let Some(end_time) = data.end_time {
        let duration = end_time - data.start_time;
        report.push_str(&format!("Duration:     {} seconds\n", duration));
    }
    report.push('\n');

    // Outcome summary
    report.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");
    report.push_str("OUTCOME SUMMARY\n");
    report.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");

    let total =
        data.outcome_counts.saved + data.outcome_counts.skipped + data.outcome_counts.failed;
    report.push_str(&format!("Total Items:  {}\n\n", total));

    if data.outcome_counts.saved > 0 {
        report.push_str(&format!("  [SAVED]    {}\n", data.outcome_counts.saved));
    }
    if data.outcome_counts.skipped > 0 {
        report.push_str(&format!("  [SKIPPED]  {}  (Already processed)\n", data.outcome_counts.skipped));
    }
    if data.outcome_counts.failed > 0 {
        report.push_str(&format!("  [FAILED]   {}  (Retried on the next run)\n", data.outcome_counts.failed));
    }
    report.push('\n');

    // Item detail
    if !data.items.is_empty() {
        report.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");
        report.push_str("ITEMS\n");
        report.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");

        for item in &data.items {
            let mut line = format!("  [{}] {}", item.outcome.to_uppercase(), item.item_id);
            if let Some(ref path) = item.artifact_path {
                line.push_str(&format!("  {}", path));
            }
            report.push_str(&line);
            report.push('\n');
        }
        report.push('\n');
    }

    // Footer
    report.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");
    report.push_str("                          End of Report\n");
    report.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");

    report
}

pub fn generate_json_report(data: &ReportData) -> Result<String, serde_json::Error> {
    let json_report = serde_json::json!({
        "report": {
            "metadata": {
                "generator": "Magpie",
                "version": env!("CARGO_PKG_VERSION"),
                "generated_at": chrono::Utc::now().to_rfc3339(),
                "format": "json"
            },
            "run": {
                "id": data.run_id,
                "site": data.site,
                "query": data.query,
                "status": data.status,
                "start_time": format_iso8601_timestamp(data.start_time),
                "end_time": data.end_time.map(format_iso8601_timestamp),
                "duration_seconds": data.end_time.map(|end| end - data.start_time)
            },
            "summary": {
                "total_items": data.outcome_counts.saved
                    + data.outcome_counts.skipped
                    + data.outcome_counts.failed,
                "outcome_breakdown": {
                    "saved": data.outcome_counts.saved,
                    "skipped": data.outcome_counts.skipped,
                    "failed": data.outcome_counts.failed
                }
            },
            "items": data.items
        }
    });

    serde_json::to_string_pretty(&json_report)
}

pub fn generate_markdown_report(data: &ReportData) -> String {
    let mut report = String::new();

    report.push_str("# Magpie Harvest Report\n\n");
    report.push_str(&format!("- **Run ID:** {}\n", data.run_id));
    report.push_str(&format!("- **Site:** {}\n", data.site));
    report.push_str(&format!("- **Query:** {}\n", data.query));
    report.push_str(&format!("- **Status:** {}\n", data.status_to_string()));
    report.push_str(&format!(
        "- **Run Date:** {}\n\n",
        data.format_timestamp(data.start_time)
    ));

    report.push_str("## Outcomes\n\n");
    report.push_str("| Outcome | Count |\n|---------|-------|\n");
    report.push_str(&format!("| Saved | {} |\n", data.outcome_counts.saved));
    report.push_str(&format!("| Skipped | {} |\n", data.outcome_counts.skipped));
    report.push_str(&format!("| Failed | {} |\n", data.outcome_counts.failed));
    report.push('\n');

    if !data.items.is_empty() {
        report.push_str("## Items\n\n");
        for item in &data.items {
            match item.artifact_path {
                Some(ref path) => {
                    report.push_str(&format!("- `{}` ({}) -> {}\n", item.item_id, item.outcome, path))
                }
                None => report.push_str(&format!("- `{}` ({})\n", item.item_id, item.outcome)),
            }
        }
    }

    report
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

// Helper functions
impl ReportData {
    fn status_to_string(&self) -> &str {
        match self.status.as_str() {
            "completed" => "Completed",
            "failed" => "Failed",
            "running" => "Running",
            _ => "Unknown",
        }
    }

    fn format_timestamp(&self, timestamp: i64) -> String {
        use chrono::{DateTime, Utc};
        let datetime = DateTime::<Utc>::from_timestamp(timestamp, 0).unwrap_or_else(Utc::now);
        datetime.format("%Y-%m-%d %H:%M:%S UTC").to_string()
    }
}

fn format_iso8601_timestamp(timestamp: i64) -> String {
    use chrono::{DateTime, Utc};
    let datetime = DateTime::<Utc>::from_timestamp(timestamp, 0).unwrap_or_else(Utc::now);
    datetime.to_rfc3339()
}
