use chrono::NaiveDateTime;
use serde::Serialize;

use crate::dates::{normalize_date, NormalizedDate};
use crate::metrics::{compute_metrics, ThreadMetrics};

/// A thread entry as scraped from the listing, before any date handling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawThread {
    pub title: String,
    /// Absolute URL of the thread.
    pub url: String,
    pub views: u64,
    pub creation_date_raw: String,
    pub last_reply_date_raw: String,
}

/// One forum thread with normalized dates and ranking metrics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThreadRecord {
    pub title: String,
    pub url: String,
    pub views: u64,
    pub creation_date_raw: String,
    pub creation_date: NormalizedDate,
    pub last_reply_date_raw: String,
    pub last_reply_date: NormalizedDate,
    #[serde(flatten)]
    pub metrics: ThreadMetrics,
}

impl ThreadRecord {
    /// Normalize the raw dates against `anchor` and derive the metrics.
    #[must_use]
    pub fn from_raw(raw: RawThread, anchor: NaiveDateTime) -> Self {
        let creation_date = normalize_date(&raw.creation_date_raw, anchor);
        let last_reply_date = normalize_date(&raw.last_reply_date_raw, anchor);
        let metrics = compute_metrics(raw.views, creation_date, last_reply_date, anchor);

        Self {
            title: raw.title,
            url: raw.url,
            views: raw.views,
            creation_date_raw: raw.creation_date_raw,
            creation_date,
            last_reply_date_raw: raw.last_reply_date_raw,
            last_reply_date,
            metrics,
        }
    }
}
