use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

const MILLIS_PER_DAY: i64 = 86_400_000;

/// `2024-5-12 @14h 30m 11s 123ms`, the host's humanized send date.
static HUMANIZED_STAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4})-(\d{1,2})-(\d{1,2}) ?@(\d{1,2})h ?(\d{1,2})m ?(\d{1,2})s(?: ?(\d{1,3})ms)?$")
        .expect("humanized timestamp pattern")
});

/// Whole days from `then` to `now`, floored.
pub fn whole_days_between(then: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    now.signed_duration_since(then)
        .num_milliseconds()
        .div_euclid(MILLIS_PER_DAY)
}

/// True iff `timestamp` is strictly more than `threshold_days` whole days
/// before `now`. A record exactly `threshold_days` old is kept.
pub fn is_expired(timestamp: Option<DateTime<Utc>>, threshold_days: u32, now: DateTime<Utc>) -> bool {
    let Some(timestamp) = timestamp else {
        return false;
    };
    whole_days_between(timestamp, now) > i64::from(threshold_days)
}

fn from_epoch_millis(ms: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
}

pub fn localize(naive: NaiveDateTime, tz: Tz) -> Option<DateTime<Utc>> {
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

fn parse_humanized(raw: &str, tz: Tz) -> Option<DateTime<Utc>> {
    let caps = HUMANIZED_STAMP.captures(raw)?;
    let num = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());
    let date = NaiveDate::from_ymd_opt(num(1)? as i32, num(2)?, num(3)?)?;
    let time = date.and_hms_milli_opt(num(4)?, num(5)?, num(6)?, num(7).unwrap_or(0))?;
    localize(time, tz)
}

fn parse_text(raw: &str, tz: Tz) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return trimmed.parse::<i64>().ok().and_then(from_epoch_millis);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Some(dt) = parse_humanized(trimmed, tz) {
        return Some(dt);
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%B %d, %Y %I:%M%p"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return localize(naive, tz);
        }
    }
    None
}

/// Parses a chat or backup timestamp as the host emits it: epoch millis
/// (number or digit string), RFC 3339, the humanized send date, or the legacy
/// `MMMM D, YYYY h:mma` form. Naive forms are read in `tz`.
pub fn parse_chat_timestamp(value: &Value, tz: Tz) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .and_then(from_epoch_millis),
        Value::String(s) => parse_text(s, tz),
        _ => None,
    }
}
