//! Per-feed query scheduling.
//!
//! A feed may be restricted to certain weekdays and to a minimum interval
//! between queries. The interval is measured against the `timeStamp` element
//! stored in the feed's own document.
//!
//! Malformed schedule configuration never disables a feed: a bad interval
//! means "query on every eligible run" and a bad weekday list means "every
//! day", each with a reported error.

use crate::status::ErrorLog;
use crate::utils::{italic, json_block};
use chrono::{DateTime, Datelike, FixedOffset, TimeDelta, Weekday};
use serde_json::Value;
use std::collections::HashSet;
use tracing::debug;

pub const ALL_DAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

const DAY_NAMES: [(&str, Weekday); 7] = [
    ("MONDAY", Weekday::Mon),
    ("TUESDAY", Weekday::Tue),
    ("WEDNESDAY", Weekday::Wed),
    ("THURSDAY", Weekday::Thu),
    ("FRIDAY", Weekday::Fri),
    ("SATURDAY", Weekday::Sat),
    ("SUNDAY", Weekday::Sun),
];

/// Full English day name, case-insensitive. Abbreviations are not accepted.
fn weekday_from_name(name: &str) -> Option<Weekday> {
    let upper = name.trim().to_ascii_uppercase();
    DAY_NAMES
        .iter()
        .find(|(full, _)| *full == upper)
        .map(|(_, day)| *day)
}

/// When a feed may be queried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    /// Minimum time between queries; `None` queries on every run.
    pub interval: Option<TimeDelta>,
    /// Never empty once parsed.
    pub active_days: HashSet<Weekday>,
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            interval: None,
            active_days: ALL_DAYS.into_iter().collect(),
        }
    }
}

impl Schedule {
    /// Decide whether the feed should be queried at `now`.
    ///
    /// `last_query` is the raw `timeStamp` text; a missing or unparseable
    /// value always allows the query.
    pub fn should_query(&self, now: &DateTime<FixedOffset>, last_query: Option<&str>) -> bool {
        if !self.active_days.contains(&now.weekday()) {
            debug!(weekday = %now.weekday(), "Feed inactive today");
            return false;
        }
        let Some(interval) = self.interval else {
            return true;
        };
        match last_query.and_then(|ts| DateTime::parse_from_rfc3339(ts.trim()).ok()) {
            // A due time past the representable range is never reached.
            Some(last) => last
                .checked_add_signed(interval)
                .is_some_and(|due| due < *now),
            None => true,
        }
    }
}

/// Convert a `{days?, hours?, minutes?}` object into a duration.
///
/// Values are taken by absolute value, fractional ones truncated; at least
/// one key must be present.
pub fn interval_from_json(value: &Value) -> Result<TimeDelta, String> {
    let Value::Object(obj) = value else {
        return Err("durations may only be objects".to_string());
    };
    let mut total = TimeDelta::zero();
    let mut any = false;
    let units: [(&str, fn(i64) -> Option<TimeDelta>); 3] = [
        ("days", TimeDelta::try_days),
        ("hours", TimeDelta::try_hours),
        ("minutes", TimeDelta::try_minutes),
    ];
    for (key, make) in units {
        let Some(raw) = obj.get(key) else {
            continue;
        };
        any = true;
        let amount = raw
            .as_i64()
            .or_else(|| raw.as_f64().map(|f| f.trunc() as i64))
            .and_then(i64::checked_abs)
            .ok_or_else(|| format!("`{key}` must be a number, was {raw}"))?;
        let part = make(amount).ok_or_else(|| format!("`{key}` value {amount} is out of range"))?;
        total = total
            .checked_add(&part)
            .ok_or_else(|| "duration is out of range".to_string())?;
    }
    if any {
        Ok(total)
    } else {
        Err("must have at least one of: <b>days</b>, <b>hours</b>, or <b>minutes</b>".to_string())
    }
}

/// Parse a feed's `time_between_queries`, reporting failures and falling back to `None`.
pub fn parse_interval(value: &Value, feed_title: &str, log: &mut ErrorLog) -> Option<TimeDelta> {
    match interval_from_json(value) {
        Ok(interval) => Some(interval),
        Err(reason) => {
            log.record(format!(
                "Unable to parse {}into a valid duration for {}, {reason}; querying on every run",
                json_block(value),
                italic(feed_title)
            ));
            None
        }
    }
}

/// Parse a feed's `days_of_week` list.
///
/// Unknown names and non-string entries are reported and skipped. An empty
/// result (or a value that is not an array) is replaced by the full week.
pub fn parse_active_days(value: &Value, feed_title: &str, log: &mut ErrorLog) -> HashSet<Weekday> {
    let Value::Array(entries) = value else {
        log.record_with(
            format!("Days of week in {} was not an array", italic(feed_title)),
            json_block(value),
        );
        return ALL_DAYS.into_iter().collect();
    };

    let mut days = HashSet::new();
    for entry in entries {
        match entry {
            Value::String(name) => match weekday_from_name(name) {
                Some(day) => {
                    days.insert(day);
                }
                None => log.record_with("Unknown day of week", json_block(entry)),
            },
            _ => log.record_with(
                format!(
                    "Days of week in {} feed must be a string value",
                    italic(feed_title)
                ),
                json_block(entry),
            ),
        }
    }

    if days.is_empty() {
        log.record(format!(
            "No valid days found for {} feed, querying every day",
            italic(feed_title)
        ));
        return ALL_DAYS.into_iter().collect();
    }
    days
}
