//! Ranking metrics derived from a thread's views and normalized dates.

use std::cmp::Ordering;

use chrono::{NaiveDateTime, TimeDelta};
use serde::{Serialize, Serializer};

use crate::dates::NormalizedDate;

/// Label used in place of an elapsed time whose date could not be parsed.
pub const UNPARSEABLE_LABEL: &str = "unparseable";

const SECONDS_PER_DAY: f64 = 86_400.0;
const SECONDS_PER_HOUR: f64 = 3_600.0;

/// An elapsed amount that is either finite or unknown.
///
/// Unknown values order after every finite one, the same way an infinite
/// float would, without storing an actual infinity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Elapsed {
    Finite(f64),
    Unparseable,
}

impl Elapsed {
    #[must_use]
    pub fn finite(&self) -> Option<f64> {
        match self {
            Self::Finite(v) => Some(*v),
            Self::Unparseable => None,
        }
    }

    /// Total order with unparseable values last.
    #[must_use]
    pub fn sort_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Finite(a), Self::Finite(b)) => a.total_cmp(b),
            (Self::Finite(_), Self::Unparseable) => Ordering::Less,
            (Self::Unparseable, Self::Finite(_)) => Ordering::Greater,
            (Self::Unparseable, Self::Unparseable) => Ordering::Equal,
        }
    }
}

impl Serialize for Elapsed {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Finite(v) => serializer.serialize_f64(*v),
            Self::Unparseable => serializer.serialize_none(),
        }
    }
}

/// Derived fields attached to every thread record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThreadMetrics {
    pub daily_views: f64,
    pub published_elapsed_label: String,
    pub published_elapsed_days: Elapsed,
    pub last_reply_elapsed_label: String,
    pub last_reply_elapsed_hours: Elapsed,
}

/// Compute the ranking metrics for one thread.
///
/// `daily_views` divides by the whole number of days since publication with a
/// floor of one day, so a post from this morning is not ranked by a tiny
/// denominator. An unparseable creation date gives zero daily views.
#[must_use]
pub fn compute_metrics(
    views: u64,
    creation: NormalizedDate,
    last_reply: NormalizedDate,
    anchor: NaiveDateTime,
) -> ThreadMetrics {
    let (daily_views, published_elapsed_label, published_elapsed_days) =
        match creation.as_datetime() {
            Some(created) => {
                let age = anchor - created;
                (
                    daily_views(views, age),
                    format_elapsed(age),
                    Elapsed::Finite(age.num_milliseconds() as f64 / 1000.0 / SECONDS_PER_DAY),
                )
            }
            None => (0.0, UNPARSEABLE_LABEL.to_string(), Elapsed::Unparseable),
        };

    let (last_reply_elapsed_label, last_reply_elapsed_hours) = match last_reply.as_datetime() {
        Some(replied) => {
            let since = anchor - replied;
            (
                format_elapsed(since),
                Elapsed::Finite(since.num_milliseconds() as f64 / 1000.0 / SECONDS_PER_HOUR),
            )
        }
        None => (UNPARSEABLE_LABEL.to_string(), Elapsed::Unparseable),
    };

    ThreadMetrics {
        daily_views,
        published_elapsed_label,
        published_elapsed_days,
        last_reply_elapsed_label,
        last_reply_elapsed_hours,
    }
}

/// `round(views / max(days, 1), 2)` where `days` is floored.
#[must_use]
pub fn daily_views(views: u64, age: TimeDelta) -> f64 {
    let days = whole_days(age).max(1);
    round2(views as f64 / days as f64)
}

/// Format a duration with its two largest units: `"3d 4h"`, `"5h 12m"` or `"7m"`.
///
/// Negative durations (dates after the anchor) are shown as zero.
#[must_use]
pub fn format_elapsed(duration: TimeDelta) -> String {
    let total_minutes = duration.num_minutes().max(0);
    let days = total_minutes / (24 * 60);
    let hours = (total_minutes / 60) % 24;
    let minutes = total_minutes % 60;

    if days > 0 {
        format!("{days}d {hours}h")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

fn whole_days(age: TimeDelta) -> i64 {
    // num_days truncates toward zero; floor it so -0.5 days counts as -1.
    let days = age.num_days();
    if age < TimeDelta::days(days) {
        days - 1
    } else {
        days
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
