//! `msgID` construction.
//!
//! A message id is a base segment followed by the current Unix time in
//! milliseconds, with no separator. Hub-level requests use the base `101`;
//! device-level requests use the last run of decimal digits found in the
//! device's `mac`, so replies can be tied back to a device without a counter.

use chrono::Utc;

pub const HUB_BASE: &str = "101";

pub fn correlation_id(mac: Option<&str>) -> String {
    correlation_id_at(mac, Utc::now().timestamp_millis())
}

pub fn correlation_id_at(mac: Option<&str>, millis: i64) -> String {
    format!("{}{}", correlation_base(mac), millis)
}

/// The base segment for `mac`; `101` when there is none or it has no digits.
pub fn correlation_base(mac: Option<&str>) -> &str {
    mac.and_then(last_digit_run).unwrap_or(HUB_BASE)
}

fn last_digit_run(s: &str) -> Option<&str> {
    let end = s.rfind(|c: char| c.is_ascii_digit())? + 1;
    let start = s[..end].trim_end_matches(|c: char| c.is_ascii_digit()).len();
    Some(&s[start..end])
}
