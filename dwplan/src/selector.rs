//! Table routing: pick the cheapest table that still answers a request at the asked-for
//! precision.
//!
//! The decision looks only at the bucket width, the width of the date range and whether the
//! caller needs per-request detail. It never looks at filters or group-by dimensions, which
//! keeps it constant-time and free of side effects; the price is that a request for a
//! dimension missing from the chosen rollup is not redirected here (see
//! [`crate::tables::AnalyticsTable::column`]).

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::interval::QueryInterval;
use crate::tables::AnalyticsTable;

/// Buckets this fine are always served from the 5-minute rollup.
const FINE_INTERVAL_MAX_MINUTES: u32 = 30;
/// Sub-day buckets (up to 12h) choose between the 5-minute and hourly rollups by range.
const SUB_DAY_INTERVAL_MAX_MINUTES: u32 = 720;
/// Ranges up to a week are cheap enough to answer from 5-minute buckets.
const SHORT_RANGE_SECS: i64 = 7 * 86_400;
/// Daily and weekly buckets only move to the daily rollup past a month.
const LONG_RANGE_SECS: i64 = 30 * 86_400;

/// Where a query should run and how its measures must be aggregated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSelectionResult {
    pub table: AnalyticsTable,
    pub use_rollup: bool,
    /// True iff the table holds partial states (split sums/counts, uniq sketches, t-digests)
    pub requires_merge_functions: bool,
    /// Human-readable explanation of the routing decision. Audit only.
    pub reason: String,
}

impl TableSelectionResult {
    fn raw(table: AnalyticsTable, reason: impl Into<String>) -> Self {
        Self {
            table,
            use_rollup: false,
            requires_merge_functions: false,
            reason: reason.into(),
        }
    }

    fn rollup(table: AnalyticsTable, reason: impl Into<String>) -> Self {
        Self {
            table,
            use_rollup: true,
            requires_merge_functions: table.storage() == crate::tables::Storage::MergeState,
            reason: reason.into(),
        }
    }
}

/// Routes requests to tables. The rollup feature flag is injected at construction so the
/// selector itself never reads process state.
#[derive(Debug, Clone, Copy)]
pub struct TableSelector {
    rollups_enabled: bool,
}

impl TableSelector {
    pub fn new(rollups_enabled: bool) -> Self {
        Self { rollups_enabled }
    }

    pub fn rollups_enabled(&self) -> bool {
        self.rollups_enabled
    }

    /// Choose the table for plain (non-geographic) metrics.
    pub fn select_metrics_table(
        &self,
        interval: QueryInterval,
        from_date: DateTime<Utc>,
        to_date: DateTime<Utc>,
        requires_detailed_data: bool,
    ) -> TableSelectionResult {
        let result = self.decide_metrics_table(interval, from_date, to_date, requires_detailed_data);
        debug!(table = %result.table, interval = %interval, reason = %result.reason, "Selected metrics table");
        result
    }

    fn decide_metrics_table(
        &self,
        interval: QueryInterval,
        from_date: DateTime<Utc>,
        to_date: DateTime<Utc>,
        requires_detailed_data: bool,
    ) -> TableSelectionResult {
        if !self.rollups_enabled {
            return TableSelectionResult::raw(AnalyticsTable::LegacyFact, "rollup tables disabled, using legacy analytics table");
        }

        if requires_detailed_data {
            return TableSelectionResult::raw(AnalyticsTable::Fact, "request needs per-record detail, no rollup can answer it");
        }

        let minutes = interval.minutes();
        let range_secs = (to_date - from_date).num_seconds();
        let range_days = range_secs as f64 / 86_400.0;

        if minutes <= FINE_INTERVAL_MAX_MINUTES {
            TableSelectionResult::rollup(
                AnalyticsTable::Rollup5m,
                format!("interval {interval} ({minutes} min) is 30 min or finer, using 5-minute rollup"),
            )
        } else if minutes <= SUB_DAY_INTERVAL_MAX_MINUTES {
            if range_secs <= SHORT_RANGE_SECS {
                TableSelectionResult::rollup(
                    AnalyticsTable::Rollup5m,
                    format!("interval {interval} over {range_days:.1} days (7 days or less), using 5-minute rollup"),
                )
            } else {
                TableSelectionResult::rollup(
                    AnalyticsTable::Rollup1h,
                    format!("interval {interval} over {range_days:.1} days (more than 7 days), using hourly rollup"),
                )
            }
        } else if range_secs > LONG_RANGE_SECS {
            TableSelectionResult::rollup(
                AnalyticsTable::Rollup1d,
                format!("interval {interval} over {range_days:.1} days (more than 30 days), using daily rollup"),
            )
        } else {
            TableSelectionResult::rollup(
                AnalyticsTable::Rollup1h,
                format!("interval {interval} over {range_days:.1} days (30 days or less), using hourly rollup"),
            )
        }
    }

    /// Choose the table for geographic breakdowns.
    pub fn select_geo_table(&self, from_date: DateTime<Utc>, to_date: DateTime<Utc>, requires_detailed_data: bool) -> TableSelectionResult {
        let range_days = (to_date - from_date).num_seconds() as f64 / 86_400.0;
        let result = if !self.rollups_enabled {
            TableSelectionResult::raw(AnalyticsTable::LegacyGeo, "rollup tables disabled, using legacy geo table")
        } else if requires_detailed_data {
            TableSelectionResult::raw(AnalyticsTable::Fact, "request needs per-record detail, reading geo columns from fact table")
        } else {
            TableSelectionResult::rollup(AnalyticsTable::Geo1h, format!("geo breakdown over {range_days:.1} days, using hourly geo rollup"))
        };
        debug!(table = %result.table, reason = %result.reason, "Selected geo table");
        result
    }

    /// Table for queries that always need individual rows: lists, counts and raw reports.
    pub fn select_detail_table(&self) -> TableSelectionResult {
        if self.rollups_enabled {
            TableSelectionResult::raw(AnalyticsTable::Fact, "row-level query, reading fact table")
        } else {
            TableSelectionResult::raw(AnalyticsTable::LegacyFact, "rollup tables disabled, using legacy analytics table")
        }
    }
}
