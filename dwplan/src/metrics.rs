//! Metric catalog and the expression compiler that renders each metric for a table.
//!
//! Every metric has three renderings, one per [`Storage`] kind:
//!
//! - **Raw rows** (fact and legacy tables): aggregate individual request values directly.
//! - **Merge state** (5-minute, hourly and geo rollups): each row already summarizes many
//!   requests, so averages are sum-of-sums over sum-of-counts, distinct counts merge uniq
//!   sketches and percentiles merge t-digests.
//! - **Finalized** (daily rollup): sums and counts are stored as plain numbers and percentiles
//!   as per-day scalars, which can only be approximated by a request-weighted mean.
//!
//! Averages over rollups must never be an average of averages: buckets hold unequal numbers of
//! requests. Averages of nullable fields divide by the stored non-null count rather than the
//! bucket's request count.
//!
//! Aliases that would shadow a rollup column of the same name (`request_count`,
//! `success_count`, `error_count`) get an `_rc` suffix. ClickHouse resolves aliases before
//! columns, so `sum(request_count) AS request_count` would make every later
//! `sum(request_count)` in the same SELECT a nested aggregate.

use chrono::{DateTime, Utc};
use std::{fmt, str::FromStr};

use crate::config::{Strictness, TableNames};
use crate::errors::{Error, Result};
use crate::interval::QueryInterval;
use crate::sql::time_range_condition;
use crate::tables::{AnalyticsTable, Storage};

/// Every metric the planner can compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    RequestCount,
    SuccessCount,
    ErrorCount,
    SuccessRate,
    ErrorRate,
    CacheHitRate,
    /// Composite: cache hits and cache hit rate
    Cache,
    LatencyAvg,
    LatencyP50,
    LatencyP95,
    LatencyP99,
    TtftAvg,
    TtftP95,
    QueuingTime,
    InputTokens,
    OutputTokens,
    TotalTokens,
    TokensPerRequest,
    Cost,
    CostPerRequest,
    Throughput,
    RequestsPerMinute,
    UniqueUsers,
    UniqueUsersExact,
    ConcurrentRequests,
}

impl Metric {
    pub const ALL: [Metric; 25] = [
        Metric::RequestCount,
        Metric::SuccessCount,
        Metric::ErrorCount,
        Metric::SuccessRate,
        Metric::ErrorRate,
        Metric::CacheHitRate,
        Metric::Cache,
        Metric::LatencyAvg,
        Metric::LatencyP50,
        Metric::LatencyP95,
        Metric::LatencyP99,
        Metric::TtftAvg,
        Metric::TtftP95,
        Metric::QueuingTime,
        Metric::InputTokens,
        Metric::OutputTokens,
        Metric::TotalTokens,
        Metric::TokensPerRequest,
        Metric::Cost,
        Metric::CostPerRequest,
        Metric::Throughput,
        Metric::RequestsPerMinute,
        Metric::UniqueUsers,
        Metric::UniqueUsersExact,
        Metric::ConcurrentRequests,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Metric::RequestCount => "request_count",
            Metric::SuccessCount => "success_count",
            Metric::ErrorCount => "error_count",
            Metric::SuccessRate => "success_rate",
            Metric::ErrorRate => "error_rate",
            Metric::CacheHitRate => "cache_hit_rate",
            Metric::Cache => "cache",
            Metric::LatencyAvg => "latency_avg",
            Metric::LatencyP50 => "latency_p50",
            Metric::LatencyP95 => "latency_p95",
            Metric::LatencyP99 => "latency_p99",
            Metric::TtftAvg => "ttft_avg",
            Metric::TtftP95 => "ttft_p95",
            Metric::QueuingTime => "queuing_time",
            Metric::InputTokens => "input_tokens",
            Metric::OutputTokens => "output_tokens",
            Metric::TotalTokens => "total_tokens",
            Metric::TokensPerRequest => "tokens_per_request",
            Metric::Cost => "cost",
            Metric::CostPerRequest => "cost_per_request",
            Metric::Throughput => "throughput",
            Metric::RequestsPerMinute => "requests_per_minute",
            Metric::UniqueUsers => "unique_users",
            Metric::UniqueUsersExact => "unique_users_exact",
            Metric::ConcurrentRequests => "concurrent_requests",
        }
    }

    /// Metrics that must be answered from the fact table whatever the interval.
    pub fn requires_detailed_data(&self) -> bool {
        matches!(
            self,
            Metric::LatencyP50
                | Metric::LatencyP95
                | Metric::LatencyP99
                | Metric::TtftP95
                | Metric::UniqueUsersExact
                | Metric::ConcurrentRequests
        )
    }

    /// Metrics with no rollup rendering at all.
    fn raw_only(&self) -> bool {
        matches!(self, Metric::UniqueUsersExact | Metric::ConcurrentRequests)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Metric {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Metric::ALL
            .into_iter()
            .find(|metric| metric.name() == s)
            .ok_or_else(|| Error::UnknownMetric { metric: s.to_string() })
    }
}

/// Parse the metrics a request names, keeping only the recognised ones.
pub fn known_metrics(names: &[String]) -> impl Iterator<Item = Metric> + '_ {
    names.iter().filter_map(|name| name.parse().ok())
}

/// Request, success, error and cache-hit counts for one storage kind.
struct Counts {
    requests: &'static str,
    successes: &'static str,
    errors: &'static str,
    cache_hits: &'static str,
}

const RAW_COUNTS: Counts = Counts {
    requests: "count()",
    successes: "countIf(is_success = 1)",
    errors: "countIf(is_success = 0)",
    cache_hits: "countIf(cache_hit = 1)",
};

const ROLLUP_COUNTS: Counts = Counts {
    requests: "sum(request_count)",
    successes: "sum(success_count)",
    errors: "sum(error_count)",
    cache_hits: "sum(cache_hit_count)",
};

/// A percentile as stored by each table kind.
struct Percentile {
    level: &'static str,
    raw_column: &'static str,
    digest_column: &'static str,
    daily_column: &'static str,
}

/// `part / whole * 100`, zero when `whole` is zero.
fn percentage(part: &str, whole: &str, alias: &str) -> String {
    format!("if({whole} > 0, {part}*100.0/{whole}, 0) AS {alias}")
}

/// `numerator / denominator`, zero when the denominator is zero.
fn ratio(numerator: &str, denominator: &str, alias: &str) -> String {
    format!("if({denominator} > 0, {numerator}/{denominator}, 0) AS {alias}")
}

/// Renders metric names into aliased SELECT fragments.
pub struct MetricCompiler<'a> {
    tables: &'a TableNames,
    strictness: Strictness,
    bucket: Option<QueryInterval>,
}

impl<'a> MetricCompiler<'a> {
    pub fn new(tables: &'a TableNames, strictness: Strictness) -> Self {
        Self {
            tables,
            strictness,
            bucket: None,
        }
    }

    /// Render rates per time bucket of this width instead of over the whole range.
    pub fn per_bucket(mut self, interval: QueryInterval) -> Self {
        self.bucket = Some(interval);
        self
    }

    /// Emit one aliased aggregate expression per requested metric (two for `cache`).
    ///
    /// `use_merge` selects the merge-state renderings; otherwise rollup tables get the
    /// finalized renderings and raw tables the raw ones. The date range is needed by
    /// `concurrent_requests`, and by `requests_per_minute` unless a bucket width is set.
    pub fn build_metric_selects(
        &self,
        table: AnalyticsTable,
        metrics: &[String],
        use_merge: bool,
        from_date: Option<DateTime<Utc>>,
        to_date: Option<DateTime<Utc>>,
    ) -> Result<Vec<String>> {
        let storage = if use_merge {
            Storage::MergeState
        } else if table.is_rollup() {
            Storage::Finalized
        } else {
            Storage::Raw
        };
        let range = from_date.zip(to_date);

        let mut selects: Vec<String> = Vec::with_capacity(metrics.len());
        for name in metrics {
            let metric = match name.parse::<Metric>() {
                Ok(metric) => metric,
                Err(err) => {
                    self.strictness.reject(err)?;
                    continue;
                }
            };

            for fragment in self.render(metric, table, storage, range)? {
                if !selects.contains(&fragment) {
                    selects.push(fragment);
                }
            }
        }
        Ok(selects)
    }

    fn render(
        &self,
        metric: Metric,
        table: AnalyticsTable,
        storage: Storage,
        range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> Result<Vec<String>> {
        if metric.raw_only() && storage != Storage::Raw {
            return Err(Error::MetricRequiresRawData {
                metric: metric.to_string(),
                table,
            });
        }

        let raw = storage == Storage::Raw;
        let counts = if raw { &RAW_COUNTS } else { &ROLLUP_COUNTS };

        let fragment = match metric {
            Metric::RequestCount => format!("{} AS request_count_rc", counts.requests),
            Metric::SuccessCount => format!("{} AS success_count_rc", counts.successes),
            Metric::ErrorCount => format!("{} AS error_count_rc", counts.errors),
            Metric::SuccessRate => percentage(counts.successes, counts.requests, "success_rate"),
            Metric::ErrorRate => percentage(counts.errors, counts.requests, "error_rate"),
            Metric::CacheHitRate => percentage(counts.cache_hits, counts.requests, "cache_hit_rate"),
            Metric::Cache => {
                return Ok(vec![
                    format!("{} AS cache_hits", counts.cache_hits),
                    percentage(counts.cache_hits, counts.requests, "cache_hit_rate"),
                ]);
            }

            Metric::LatencyAvg => self.mean("response_time_ms", "response_time", raw, "latency_avg"),
            Metric::TtftAvg => self.mean("ttft_ms", "ttft", raw, "ttft_avg"),
            Metric::QueuingTime => self.mean("queuing_time_ms", "queuing_time", raw, "queuing_time"),

            Metric::LatencyP50 => self.percentile(&LATENCY_P50, storage, "latency_p50"),
            Metric::LatencyP95 => self.percentile(&LATENCY_P95, storage, "latency_p95"),
            Metric::LatencyP99 => self.percentile(&LATENCY_P99, storage, "latency_p99"),
            Metric::TtftP95 => self.percentile(&TTFT_P95, storage, "ttft_p95"),

            Metric::InputTokens if raw => "sum(input_tokens) AS total_input_tokens".to_string(),
            Metric::InputTokens => "sum(input_tokens_sum) AS total_input_tokens".to_string(),
            Metric::OutputTokens if raw => "sum(output_tokens) AS total_output_tokens".to_string(),
            Metric::OutputTokens => "sum(output_tokens_sum) AS total_output_tokens".to_string(),
            Metric::TotalTokens => format!("{} AS total_tokens", total_tokens(raw)),
            Metric::TokensPerRequest => ratio(&format!("({})", total_tokens(raw)), counts.requests, "tokens_per_request"),

            Metric::Cost if raw => "sum(cost) AS total_cost".to_string(),
            Metric::Cost => "sum(cost_sum) AS total_cost".to_string(),
            Metric::CostPerRequest => ratio(if raw { "sum(cost)" } else { "sum(cost_sum)" }, counts.requests, "cost_per_request"),

            // Per-request tokens/second averaged on raw rows; summed tokens over summed
            // generation time on rollups. The two differ, the rollup figure is the one we keep.
            Metric::Throughput if raw => {
                "avgIf(output_tokens * 1000.0 / generation_time_ms, generation_time_ms > 0) AS throughput".to_string()
            }
            Metric::Throughput => ratio(
                "sum(generated_tokens_sum)*1000.0",
                "sum(generation_time_ms_sum)",
                "throughput",
            ),

            Metric::RequestsPerMinute => {
                let minutes = match (self.bucket, range) {
                    (Some(interval), _) => i64::from(interval.minutes()),
                    (None, Some((from, to))) => (to - from).num_minutes().max(1),
                    (None, None) => return Err(Error::invalid("requests_per_minute needs both from_date and to_date")),
                };
                format!("{} / {minutes} AS requests_per_minute", counts.requests)
            }

            Metric::UniqueUsers => match storage {
                Storage::Raw => "uniqExact(user_id) AS unique_users".to_string(),
                Storage::MergeState => "uniqMerge(unique_users_state) AS unique_users".to_string(),
                // Daily distinct counts can't be merged; the sum is an upper bound.
                Storage::Finalized => "sum(unique_users_daily) AS unique_users".to_string(),
            },
            Metric::UniqueUsersExact => "uniqExact(user_id) AS unique_users_exact".to_string(),
            Metric::ConcurrentRequests => {
                let (from, to) = range.ok_or_else(|| Error::invalid("concurrent_requests needs both from_date and to_date"))?;
                self.concurrent_requests(table, from, to)
            }
        };

        Ok(vec![fragment])
    }

    /// Mean of a nullable per-request field. Rollups store `<prefix>_sum` and the non-null
    /// `<prefix>_count` next to it.
    fn mean(&self, raw_column: &str, rollup_prefix: &str, raw: bool, alias: &str) -> String {
        if raw {
            format!("avg({raw_column}) AS {alias}")
        } else {
            ratio(
                &format!("sum({rollup_prefix}_sum)"),
                &format!("sum({rollup_prefix}_count)"),
                alias,
            )
        }
    }

    fn percentile(&self, percentile: &Percentile, storage: Storage, alias: &str) -> String {
        let Percentile {
            level,
            raw_column,
            digest_column,
            daily_column,
        } = percentile;
        match storage {
            Storage::Raw => format!("quantile({level})({raw_column}) AS {alias}"),
            // quantilesTDigestMerge returns one element per requested level
            Storage::MergeState => format!("quantilesTDigestMerge({level})({digest_column})[1] AS {alias}"),
            Storage::Finalized => ratio(
                &format!("sum({daily_column} * request_count)"),
                "sum(request_count)",
                alias,
            ),
        }
    }

    /// Approximate concurrency: the mean size of groups of requests that arrived at the same
    /// timestamp, ignoring requests that arrived alone. Not a true in-flight measurement.
    fn concurrent_requests(&self, table: AnalyticsTable, from: DateTime<Utc>, to: DateTime<Utc>) -> String {
        let ts = table.timestamp_column();
        format!(
            "(SELECT avgOrDefault(c) FROM (SELECT count() AS c FROM {} WHERE {} GROUP BY {ts} HAVING c > 1)) AS concurrent_requests",
            self.tables.name(table),
            time_range_condition(table, from, to)
        )
    }
}

fn total_tokens(raw: bool) -> &'static str {
    if raw {
        "sum(input_tokens + output_tokens)"
    } else {
        "sum(input_tokens_sum) + sum(output_tokens_sum)"
    }
}

const LATENCY_P50: Percentile = Percentile {
    level: "0.5",
    raw_column: "response_time_ms",
    digest_column: "response_time_digest",
    daily_column: "response_time_p50_ms",
};

const LATENCY_P95: Percentile = Percentile {
    level: "0.95",
    raw_column: "response_time_ms",
    digest_column: "response_time_digest",
    daily_column: "response_time_p95_ms",
};

const LATENCY_P99: Percentile = Percentile {
    level: "0.99",
    raw_column: "response_time_ms",
    digest_column: "response_time_digest",
    daily_column: "response_time_p99_ms",
};

const TTFT_P95: Percentile = Percentile {
    level: "0.95",
    raw_column: "ttft_ms",
    digest_column: "ttft_digest",
    daily_column: "ttft_p95_ms",
};
