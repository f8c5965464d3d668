//! Per-stream extraction report.

use std::path::Path;

use anyhow::{Context, Result};
use prettytable::{Table, row};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum StreamStatus {
    Completed,
    /// No topic for this stream in the bag.
    Absent,
    Cancelled,
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamReport {
    pub stream: String,
    pub topic: Option<String>,
    pub status: StreamStatus,
    pub messages_seen: u64,
    pub frames_written: u64,
    pub frames_skipped_existing: u64,
    pub frames_skipped_error: u64,
    pub elapsed_ms: u64,
}

impl StreamReport {
    pub fn new(stream: &str) -> Self {
        Self {
            stream: stream.to_string(),
            topic: None,
            status: StreamStatus::Completed,
            messages_seen: 0,
            frames_written: 0,
            frames_skipped_existing: 0,
            frames_skipped_error: 0,
            elapsed_ms: 0,
        }
    }

    pub fn absent(stream: &str) -> Self {
        Self {
            status: StreamStatus::Absent,
            ..Self::new(stream)
        }
    }

    pub fn failed(stream: &str, reason: impl Into<String>) -> Self {
        Self {
            status: StreamStatus::Failed {
                reason: reason.into(),
            },
            ..Self::new(stream)
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, StreamStatus::Failed { .. })
    }
}

pub fn print_reports(reports: &[StreamReport]) {
    let mut table = Table::new();
    table.set_titles(row!["Stream", "Topic", "Status", "Seen", "Written", "Existing", "Errors", "Time(s)"]);
    for report in reports {
        let status = match &report.status {
            StreamStatus::Completed => "completed".to_string(),
            StreamStatus::Absent => "absent".to_string(),
            StreamStatus::Cancelled => "cancelled".to_string(),
            StreamStatus::Failed { reason } => format!("failed: {reason}"),
        };
        table.add_row(row![
            report.stream,
            report.topic.as_deref().unwrap_or("-"),
            status,
            report.messages_seen,
            report.frames_written,
            report.frames_skipped_existing,
            report.frames_skipped_error,
            format!("{:.2}", report.elapsed_ms as f64 / 1000.0)
        ]);
    }
    table.printstd();
}

pub fn write_json(reports: &[StreamReport], path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("failed to create report: {}", path.display()))?;
    serde_json::to_writer_pretty(file, reports)
        .with_context(|| format!("failed to write report: {}", path.display()))?;
    Ok(())
}
