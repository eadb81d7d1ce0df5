//! Normalization of the forum's human-readable date strings.
//!
//! Discuz renders recent timestamps relative to the moment the page was
//! served ("3 小时前", "昨天 14:30") and older ones as absolute dates.
//! Everything is resolved against one anchor instant captured at crawl start,
//! so records fetched minutes apart still agree with each other.

use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

static CLOCK_TIME: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{1,2}:\d{2})").unwrap());

static FIRST_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)").unwrap());

const YESTERDAY_MARKERS: &[&str] = &["昨天", "yesterday"];
const DAY_BEFORE_YESTERDAY_MARKERS: &[&str] =
    &["前天", "day-before-yesterday", "day before yesterday"];
const HOURS_AGO_MARKERS: &[&str] = &["小时前", "hours ago", "hour ago"];
const MINUTES_AGO_MARKERS: &[&str] = &["分钟前", "minutes ago", "minute ago"];
const DAYS_AGO_MARKERS: &[&str] = &["天前", "days ago", "day ago"];

const HALF_HOUR_AGO: &str = "半小时前";
const JUST_NOW_MARKERS: &[&str] = &["刚刚", "just now"];

/// A date string resolved against the crawl anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizedDate {
    Parsed(NaiveDateTime),
    Unparseable,
}

impl NormalizedDate {
    #[must_use]
    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Self::Parsed(dt) => Some(*dt),
            Self::Unparseable => None,
        }
    }

    #[must_use]
    pub fn is_parsed(&self) -> bool {
        matches!(self, Self::Parsed(_))
    }
}

impl From<Option<NaiveDateTime>> for NormalizedDate {
    fn from(value: Option<NaiveDateTime>) -> Self {
        value.map_or(Self::Unparseable, Self::Parsed)
    }
}

/// Resolve a raw forum date string to an absolute timestamp.
///
/// Patterns are tried in a fixed order and the first one that matches wins:
/// yesterday, day before yesterday, hours ago, minutes ago, days ago, then
/// the absolute `YYYY-MM-DD HH:MM` and `YYYY-MM-DD` layouts. A relative
/// marker whose number or clock time is missing falls through to the
/// absolute layouts, which will normally reject it as well.
#[must_use]
pub fn normalize_date(raw: &str, anchor: NaiveDateTime) -> NormalizedDate {
    let text = raw.trim();
    let lower = text.to_lowercase();

    relative_date(&lower, anchor)
        .or_else(|| parse_absolute(text))
        .into()
}

fn relative_date(text: &str, anchor: NaiveDateTime) -> Option<NaiveDateTime> {
    let day_before_yesterday = contains_any(text, DAY_BEFORE_YESTERDAY_MARKERS);

    // "day before yesterday" contains "yesterday"; only the 昨天 form and a
    // bare English "yesterday" belong to the first rule.
    if !day_before_yesterday && contains_any(text, YESTERDAY_MARKERS) {
        return days_back_at_clock(text, anchor, 1);
    }
    if day_before_yesterday {
        return days_back_at_clock(text, anchor, 2);
    }
    if contains_any(text, HOURS_AGO_MARKERS) && !text.contains(HALF_HOUR_AGO) {
        return first_number(text)
            .and_then(TimeDelta::try_hours)
            .and_then(|delta| anchor.checked_sub_signed(delta));
    }
    if text.contains(HALF_HOUR_AGO) {
        return anchor.checked_sub_signed(TimeDelta::minutes(30));
    }
    if contains_any(text, MINUTES_AGO_MARKERS) {
        return first_number(text)
            .and_then(TimeDelta::try_minutes)
            .and_then(|delta| anchor.checked_sub_signed(delta));
    }
    if contains_any(text, JUST_NOW_MARKERS) {
        return Some(anchor);
    }
    if contains_any(text, DAYS_AGO_MARKERS) {
        return first_number(text)
            .and_then(TimeDelta::try_days)
            .and_then(|delta| anchor.checked_sub_signed(delta));
    }
    None
}

fn parse_absolute(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .map(|date| date.and_time(NaiveTime::MIN))
        })
}

fn days_back_at_clock(text: &str, anchor: NaiveDateTime, days: u64) -> Option<NaiveDateTime> {
    let clock = CLOCK_TIME.captures(text)?;
    let time = NaiveTime::parse_from_str(&clock[1], "%H:%M").ok()?;
    let date = anchor.date().checked_sub_days(Days::new(days))?;
    Some(date.and_time(time))
}

fn first_number(text: &str) -> Option<i64> {
    FIRST_NUMBER.captures(text)?[1].parse().ok()
}

fn contains_any(text: &str, markers: &[&str]) -> bool {
    markers.iter().any(|m| text.contains(m))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn anchor() -> NaiveDateTime {
        NaiveDateTime::parse_from_str("2024-03-10 08:15", "%Y-%m-%d %H:%M").unwrap()
    }

    fn at(s: &str) -> NormalizedDate {
        NormalizedDate::Parsed(NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap())
    }

    #[test]
    fn test_relative_offsets_are_exact() {
        let t = anchor();
        for n in [0_i64, 1, 7, 59, 240, 10_000] {
            assert_eq!(
                normalize_date(&format!("{n} 分钟前"), t),
                NormalizedDate::Parsed(t - TimeDelta::minutes(n))
            );
            assert_eq!(
                normalize_date(&format!("{n} 小时前"), t),
                NormalizedDate::Parsed(t - TimeDelta::hours(n))
            );
            assert_eq!(
                normalize_date(&format!("{n} 天前"), t),
                NormalizedDate::Parsed(t - TimeDelta::days(n))
            );
            assert_eq!(
                normalize_date(&format!("{n} minutes ago"), t),
                NormalizedDate::Parsed(t - TimeDelta::minutes(n))
            );
            assert_eq!(
                normalize_date(&format!("{n} hours ago"), t),
                NormalizedDate::Parsed(t - TimeDelta::hours(n))
            );
            assert_eq!(
                normalize_date(&format!("{n} days ago"), t),
                NormalizedDate::Parsed(t - TimeDelta::days(n))
            );
        }
    }

    #[test]
    fn test_yesterday_uses_embedded_clock() {
        assert_eq!(normalize_date("昨天 14:30", anchor()), at("2024-03-09 14:30"));
        assert_eq!(normalize_date("yesterday 14:30", anchor()), at("2024-03-09 14:30"));
    }

    #[test]
    fn test_day_before_yesterday_uses_embedded_clock() {
        assert_eq!(normalize_date("前天 09:05", anchor()), at("2024-03-08 09:05"));
        assert_eq!(
            normalize_date("day-before-yesterday 09:05", anchor()),
            at("2024-03-08 09:05")
        );
        assert_eq!(
            normalize_date("Day before yesterday 23:59", anchor()),
            at("2024-03-08 23:59")
        );
    }

    #[test]
    fn test_yesterday_crosses_month_boundary() {
        let t = NaiveDateTime::parse_from_str("2024-03-01 00:10", "%Y-%m-%d %H:%M").unwrap();
        assert_eq!(normalize_date("昨天 22:00", t), at("2024-02-29 22:00"));
        assert_eq!(normalize_date("前天 22:00", t), at("2024-02-28 22:00"));
    }

    #[test]
    fn test_yesterday_without_clock_is_unparseable() {
        assert_eq!(normalize_date("昨天", anchor()), NormalizedDate::Unparseable);
    }

    #[test]
    fn test_absolute_formats() {
        assert_eq!(normalize_date("2023-11-02 17:45", anchor()), at("2023-11-02 17:45"));
        assert_eq!(normalize_date("  2023-11-02  ", anchor()), at("2023-11-02 00:00"));
        assert_eq!(normalize_date("2023-5-7 09:03", anchor()), at("2023-05-07 09:03"));
    }

    #[test]
    fn test_half_hour_and_just_now() {
        let t = anchor();
        assert_eq!(
            normalize_date("半小时前", t),
            NormalizedDate::Parsed(t - TimeDelta::minutes(30))
        );
        assert_eq!(normalize_date("刚刚", t), NormalizedDate::Parsed(t));
    }

    #[test]
    fn test_garbage_is_unparseable() {
        for raw in ["", "N/A", "小时前", "2023/11/02", "tomorrow", "2023-13-40"] {
            assert_eq!(normalize_date(raw, anchor()), NormalizedDate::Unparseable, "{raw}");
        }
    }

    #[test]
    fn test_huge_offset_does_not_panic() {
        assert_eq!(
            normalize_date("99999999999999 天前", anchor()),
            NormalizedDate::Unparseable
        );
    }
}
