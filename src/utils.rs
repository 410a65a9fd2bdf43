use chrono::{DateTime, Utc};
use std::time::Duration;

/// Timestamp layout used in summary lines.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format a `Duration` as a human-readable string with automatic unit scaling.
///
/// Produces output like `1.94ms`, `2.34s`, `150.00µs` using Rust's Debug format.
pub fn fmt_duration(d: Duration) -> String {
    format!("{d:.2?}")
}

/// Format an optional UTC timestamp for summary output, `never` when unset.
pub fn fmt_timestamp(ts: Option<DateTime<Utc>>) -> String {
    match ts {
        Some(ts) => ts.format(TIMESTAMP_FORMAT).to_string(),
        None => "never".to_owned(),
    }
}
