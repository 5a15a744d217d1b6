//! Literal rendering and time bucketing for the generated ClickHouse SQL.
//!
//! Queries are assembled as plain strings, so every value that originates outside this crate
//! must reach the query through [`quote`]. Identifiers never come from callers: they are
//! looked up in the closed column mapping in [`crate::tables`].

use chrono::{DateTime, Utc};

use crate::interval::QueryInterval;
use crate::tables::AnalyticsTable;

/// Escape a value for use inside a single-quoted string literal.
///
/// Single quotes are doubled. Backslashes are doubled too, since ClickHouse treats a backslash
/// inside a literal as an escape character and `\'` would otherwise close nothing and reopen
/// the literal.
pub fn escape_string(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len() + 2);
    for c in value.chars() {
        match c {
            '\'' => escaped.push_str("''"),
            '\\' => escaped.push_str("\\\\"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Render a string as a quoted SQL literal.
pub fn quote(value: &str) -> String {
    format!("'{}'", escape_string(value))
}

/// Render a timestamp bound comparable against the table's timestamp column.
///
/// The daily rollup keys rows by `Date`, so bounds are truncated to the day there.
pub fn time_literal(table: AnalyticsTable, at: DateTime<Utc>) -> String {
    if table.has_date_timestamp() {
        format!("toDate({})", quote(&at.format("%Y-%m-%d").to_string()))
    } else {
        format!("toDateTime({}, 'UTC')", quote(&at.format("%Y-%m-%d %H:%M:%S").to_string()))
    }
}

/// Inclusive time-range predicate on the table's timestamp column.
pub fn time_range_condition(table: AnalyticsTable, from_date: DateTime<Utc>, to_date: DateTime<Utc>) -> String {
    let ts = table.timestamp_column();
    format!(
        "{ts} >= {} AND {ts} <= {}",
        time_literal(table, from_date),
        time_literal(table, to_date)
    )
}

/// Truncation expression placing each row into its time bucket.
///
/// Sub-hour intervals with a dedicated ClickHouse function use it; the others use the generic
/// `toStartOfInterval`. Date columns are widened to `DateTime` first so every bucket has the
/// same type whichever table served the query.
pub fn build_time_bucket(interval: QueryInterval, table: AnalyticsTable) -> String {
    let ts = if table.has_date_timestamp() {
        format!("toDateTime({})", table.timestamp_column())
    } else {
        table.timestamp_column().to_string()
    };

    match interval {
        QueryInterval::OneMinute => format!("toStartOfMinute({ts})"),
        QueryInterval::FiveMinutes => format!("toStartOfFiveMinutes({ts})"),
        QueryInterval::FifteenMinutes => format!("toStartOfFifteenMinutes({ts})"),
        QueryInterval::ThirtyMinutes => format!("toStartOfInterval({ts}, INTERVAL 30 MINUTE)"),
        QueryInterval::OneHour => format!("toStartOfHour({ts})"),
        QueryInterval::SixHours => format!("toStartOfInterval({ts}, INTERVAL 6 HOUR)"),
        QueryInterval::TwelveHours => format!("toStartOfInterval({ts}, INTERVAL 12 HOUR)"),
        QueryInterval::OneDay => format!("toStartOfDay({ts})"),
        QueryInterval::OneWeek => format!("toStartOfWeek({ts})"),
    }
}
