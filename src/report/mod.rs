//! The ranked thread report.
//!
//! Records are sorted by daily views and written to an `.xlsx` workbook named
//! after the crawl anchor, optionally with a JSON copy of the same rows.

pub mod color;
mod xlsx;

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use rust_xlsxwriter::ColNum;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::crawl::CrawlSession;
use crate::models::ThreadRecord;

pub use xlsx::build_workbook;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to build workbook: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
    #[error("failed to write report: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize report: {0}")]
    Json(#[from] serde_json::Error),
}

/// Report columns in output order. The last two are hidden helpers that only
/// drive the elapsed-time gradients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Title,
    Views,
    DailyViews,
    Published,
    SincePublished,
    LastReply,
    SinceLastReply,
    Url,
    PublishedDays,
    LastReplyHours,
}

pub const COLUMNS: [Column; 10] = [
    Column::Title,
    Column::Views,
    Column::DailyViews,
    Column::Published,
    Column::SincePublished,
    Column::LastReply,
    Column::SinceLastReply,
    Column::Url,
    Column::PublishedDays,
    Column::LastReplyHours,
];

impl Column {
    #[must_use]
    pub fn index(self) -> ColNum {
        self as ColNum
    }

    #[must_use]
    pub fn header(self) -> &'static str {
        match self {
            Self::Title => "Title",
            Self::Views => "Views",
            Self::DailyViews => "Daily Views",
            Self::Published => "Published",
            Self::SincePublished => "Since Published",
            Self::LastReply => "Last Reply",
            Self::SinceLastReply => "Since Last Reply",
            Self::Url => "URL",
            Self::PublishedDays => "Published Days Ago",
            Self::LastReplyHours => "Last Reply Hours Ago",
        }
    }

    #[must_use]
    pub fn width(self) -> f64 {
        match self {
            Self::Title | Self::Url => 100.0,
            Self::Views => 12.0,
            Self::DailyViews | Self::Published => 15.0,
            Self::SincePublished | Self::SinceLastReply => 18.0,
            Self::LastReply => 20.0,
            Self::PublishedDays | Self::LastReplyHours => 0.0,
        }
    }

    #[must_use]
    pub fn is_helper(self) -> bool {
        matches!(self, Self::PublishedDays | Self::LastReplyHours)
    }
}

/// Where and how to write the report.
#[derive(Debug, Clone)]
pub struct ReportOptions {
    pub dir: PathBuf,
    pub prefix: String,
    /// Also write the sorted rows as JSON next to the workbook.
    pub json: bool,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    generated_at: NaiveDateTime,
    pages_visited: usize,
    skipped_entries: usize,
    threads: &'a [ThreadRecord],
}

/// Sort descending by daily views; equal values keep their crawl order.
pub fn sort_by_daily_views(records: &mut [ThreadRecord]) {
    records.sort_by(|a, b| b.metrics.daily_views.total_cmp(&a.metrics.daily_views));
}

/// `{prefix}_{YYYY-mm-dd_HH-MM-SS}.xlsx`
#[must_use]
pub fn report_file_name(prefix: &str, generated_at: NaiveDateTime) -> String {
    format!("{prefix}_{}.xlsx", generated_at.format("%Y-%m-%d_%H-%M-%S"))
}

/// Consume a finished crawl and write its report.
///
/// Returns the workbook path, or `None` when the crawl found no threads, in
/// which case nothing is written.
///
/// # Errors
///
/// Returns an error if the workbook or the JSON copy cannot be written.
pub fn write_report(
    session: CrawlSession,
    options: &ReportOptions,
) -> Result<Option<PathBuf>, ReportError> {
    let CrawlSession {
        anchor_now,
        mut records,
        pages_visited,
        skipped_entries,
    } = session;

    if records.is_empty() {
        info!("No threads collected, skipping report");
        return Ok(None);
    }

    info!(records = records.len(), "Generating report");
    sort_by_daily_views(&mut records);

    std::fs::create_dir_all(&options.dir)?;
    let path = options.dir.join(report_file_name(&options.prefix, anchor_now));

    let mut workbook = build_workbook(&records)?;
    workbook.save(&path)?;
    info!(path = %path.display(), "Report saved");

    if options.json {
        let json_path = path.with_extension("json");
        write_json(
            &json_path,
            &JsonReport {
                generated_at: anchor_now,
                pages_visited,
                skipped_entries,
                threads: &records,
            },
        )?;
        info!(path = %json_path.display(), "JSON report saved");
    }

    Ok(Some(path))
}

fn write_json(path: &Path, report: &JsonReport<'_>) -> Result<(), ReportError> {
    let file = std::fs::File::create(path)?;
    serde_json::to_writer_pretty(std::io::BufWriter::new(file), report)?;
    Ok(())
}
