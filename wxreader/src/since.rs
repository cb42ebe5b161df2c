//! Parsing for the `since` message filter

use chrono::{DateTime, NaiveDate};

/// Parse a lower time bound into epoch seconds.
///
/// Accepts epoch seconds (`1700000000`), RFC 3339 (`2024-03-01T08:00:00+08:00`)
/// or a UTC calendar date (`2024-03-01`). `0` disables the filter.
pub fn parse_since(raw: &str) -> Result<i64, String> {
    let raw = raw.trim();

    if let Ok(secs) = raw.parse::<i64>() {
        if secs < 0 {
            return Err(format!("since must not be negative: {secs}"));
        }
        return Ok(secs);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.timestamp().max(0));
    }

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc().timestamp().max(0));
        }
    }

    Err(format!(
        "invalid since value {raw:?}: expected epoch seconds, RFC 3339 or YYYY-MM-DD"
    ))
}
