//! Fixed report templates.
//!
//! Row-level reports read the detail table. The usage reports are metric queries with a fixed
//! metric list and go through table selection like any other metrics request.

use super::{QueryBuilder, SelectStatement, validate_range};
use crate::errors::{Error, Result};
use crate::filters::{FilterValue, Filters, Scalar, build_filter_conditions, resolve_column};
use crate::interval::QueryInterval;
use crate::metrics::MetricCompiler;
use crate::models::{MetricsQuery, PlannedQuery, ReportKind, ReportQuery};
use crate::sql::quote;
use crate::tables::{AnalyticsTable, LogicalField};

const USAGE_METRICS: [&str; 6] = ["request_count", "input_tokens", "output_tokens", "total_tokens", "cost", "unique_users"];

const BREAKDOWN_METRICS: [&str; 3] = ["request_count", "success_rate", "latency_avg"];

const TOP_ROUTE_METRICS: [&str; 3] = ["request_count", "error_rate", "latency_avg"];

fn metric_list(metrics: &[&str]) -> Vec<String> {
    metrics.iter().map(|m| m.to_string()).collect()
}

impl QueryBuilder {
    /// Route and build a fixed report.
    pub fn build_report(&self, query: &ReportQuery) -> Result<PlannedQuery> {
        validate_range(query.from_date, query.to_date)?;

        match &query.report {
            ReportKind::UsageSummary => self.usage_report(query, QueryInterval::OneDay, false, &query.filters),
            ReportKind::UsageHistory { interval } => self.usage_report(query, *interval, true, &query.filters),
            ReportKind::UsageByProject => self.usage_by_project(query, &query.filters),
            ReportKind::BulkUsage { project_ids } => {
                if project_ids.is_empty() {
                    return Err(Error::invalid("bulk_usage needs at least one project id"));
                }
                let mut filters = query.filters.clone();
                filters.insert(
                    LogicalField::Project.as_str().to_string(),
                    FilterValue::List(project_ids.iter().map(|id| Scalar::Text(id.clone())).collect()),
                );
                self.usage_by_project(query, &filters)
            }
            ReportKind::TopRoutes { limit } => self.detail_report(query, |table| self.top_routes(table, query, *limit)),
            ReportKind::ClientAnalytics { dimension } => {
                self.detail_report(query, |table| self.breakdown(table, query, dimension.field()))
            }
            ReportKind::LatencyHistogram => self.detail_report(query, |table| self.latency_histogram(table, query)),
            ReportKind::CredentialSync => self.detail_report(query, |table| self.credential_sync(table, query)),
            ReportKind::UserSync => self.detail_report(query, |table| self.user_sync(table, query)),
        }
    }

    fn detail_report(&self, query: &ReportQuery, build: impl FnOnce(AnalyticsTable) -> Result<String>) -> Result<PlannedQuery> {
        let selection = self.selector.select_detail_table();
        let sql = build(selection.table)?;
        tracing::debug!(report = query.report.name(), table = %selection.table, "Built report query");
        Ok(PlannedQuery { sql, selection })
    }

    fn usage_report(
        &self,
        query: &ReportQuery,
        interval: QueryInterval,
        bucketed: bool,
        filters: &Filters,
    ) -> Result<PlannedQuery> {
        let metrics_query = MetricsQuery {
            metrics: metric_list(&USAGE_METRICS),
            from_date: query.from_date,
            to_date: query.to_date,
            interval,
            filters: filters.clone(),
            group_by: vec![],
            requires_detailed_data: false,
        };
        let selection = self.route_metrics(&metrics_query);
        let sql = if bucketed {
            self.build_time_series_query(&selection, &metrics_query)?
        } else {
            self.build_aggregated_query(&selection, &metrics_query)?
        };
        Ok(PlannedQuery { sql, selection })
    }

    fn usage_by_project(&self, query: &ReportQuery, filters: &Filters) -> Result<PlannedQuery> {
        let metrics_query = MetricsQuery {
            metrics: metric_list(&USAGE_METRICS),
            from_date: query.from_date,
            to_date: query.to_date,
            interval: QueryInterval::OneDay,
            filters: filters.clone(),
            group_by: vec![LogicalField::Project.as_str().to_string()],
            requires_detailed_data: false,
        };
        let selection = self.route_metrics(&metrics_query);
        let sql = self.build_aggregated_query(&selection, &metrics_query)?;
        Ok(PlannedQuery { sql, selection })
    }

    fn raw_metrics(&self, table: AnalyticsTable, metrics: &[&str]) -> Result<Vec<String>> {
        MetricCompiler::new(&self.config.tables, self.strictness()).build_metric_selects(table, &metric_list(metrics), false, None, None)
    }

    fn top_routes(&self, table: AnalyticsTable, query: &ReportQuery, limit: Option<u32>) -> Result<String> {
        let max = self.config.reports.top_routes_limit;
        let limit = limit.map_or(max, |l| l.clamp(1, max));
        let route = self.group_column(table, LogicalField::Route)?;
        let route_column = resolve_column(table, LogicalField::Route, self.strictness())?;

        Ok(SelectStatement::from(self.table_name(table))
            .select(route.select)
            .select_all(self.raw_metrics(table, &TOP_ROUTE_METRICS)?)
            .filter_all(build_filter_conditions(table, query.from_date, query.to_date, &query.filters, self.strictness())?)
            .filter(format!("{route_column} != ''"))
            .group_by([route.key.to_string()])
            .order_by("request_count_rc DESC")
            .limit(u64::from(limit))
            .build())
    }

    fn breakdown(&self, table: AnalyticsTable, query: &ReportQuery, field: LogicalField) -> Result<String> {
        let group = self.group_column(table, field)?;

        Ok(SelectStatement::from(self.table_name(table))
            .select(group.select)
            .select_all(self.raw_metrics(table, &BREAKDOWN_METRICS)?)
            .filter_all(build_filter_conditions(table, query.from_date, query.to_date, &query.filters, self.strictness())?)
            .group_by([group.key.to_string()])
            .order_by("request_count_rc DESC")
            .build())
    }

    /// One row per latency band, labelled `<100ms`, `100-250ms`, ... `>=10000ms`.
    fn latency_histogram(&self, table: AnalyticsTable, query: &ReportQuery) -> Result<String> {
        let bounds = &self.config.reports.histogram_bucket_bounds_ms;
        let mut arms = Vec::with_capacity(bounds.len() * 2 + 1);
        let mut lower: Option<u32> = None;
        for bound in bounds {
            let label = match lower {
                None => format!("<{bound}ms"),
                Some(lower) => format!("{lower}-{bound}ms"),
            };
            arms.push(format!("response_time_ms < {bound}"));
            arms.push(quote(&label));
            lower = Some(*bound);
        }
        let last = bounds.last().copied().unwrap_or_default();
        arms.push(quote(&format!(">={last}ms")));

        Ok(SelectStatement::from(self.table_name(table))
            .select(format!("multiIf({}) AS latency_bucket", arms.join(", ")))
            .select("count() AS request_count_rc")
            .select("min(response_time_ms) AS min_latency_ms")
            .filter_all(build_filter_conditions(table, query.from_date, query.to_date, &query.filters, self.strictness())?)
            .filter("response_time_ms IS NOT NULL")
            .group_by(["latency_bucket".to_string()])
            .order_by("min_latency_ms")
            .build())
    }

    fn credential_sync(&self, table: AnalyticsTable, query: &ReportQuery) -> Result<String> {
        let key = self.group_column(table, LogicalField::ApiKey)?;
        let key_column = resolve_column(table, LogicalField::ApiKey, self.strictness())?;
        let ts = table.timestamp_column();

        Ok(SelectStatement::from(self.table_name(table))
            .select(key.select)
            .select(format!("max({ts}) AS last_used_at"))
            .select("count() AS request_count_rc")
            .filter_all(build_filter_conditions(table, query.from_date, query.to_date, &query.filters, self.strictness())?)
            .filter(format!("{key_column} != ''"))
            .group_by([key.key.to_string()])
            .order_by("last_used_at DESC")
            .build())
    }

    fn user_sync(&self, table: AnalyticsTable, query: &ReportQuery) -> Result<String> {
        let user = self.group_column(table, LogicalField::User)?;
        let user_column = resolve_column(table, LogicalField::User, self.strictness())?;
        let ts = table.timestamp_column();

        Ok(SelectStatement::from(self.table_name(table))
            .select(user.select)
            .select(format!("min({ts}) AS first_seen_at"))
            .select(format!("max({ts}) AS last_seen_at"))
            .select("count() AS request_count_rc")
            .filter_all(build_filter_conditions(table, query.from_date, query.to_date, &query.filters, self.strictness())?)
            .filter(format!("{user_column} != ''"))
            .group_by([user.key.to_string()])
            .order_by("last_seen_at DESC")
            .build())
    }
}

#[cfg(test)]
mod tests {
    use crate::builder::QueryBuilder;
    use crate::config::Config;
    use crate::errors::Error;
    use crate::filters::Filters;
    use crate::interval::QueryInterval;
    use crate::models::{ClientDimension, ReportKind, ReportQuery};
    use crate::tables::AnalyticsTable;
    use chrono::{Duration, TimeZone, Utc};

    fn report(kind: ReportKind, days: i64) -> ReportQuery {
        let from = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        ReportQuery {
            report: kind,
            from_date: from,
            to_date: from + Duration::days(days),
            filters: Filters::new(),
        }
    }

    fn builder() -> QueryBuilder {
        QueryBuilder::new(Config::default()).unwrap()
    }

    #[test]
    fn test_top_routes() {
        let planned = builder().build_report(&report(ReportKind::TopRoutes { limit: Some(500) }, 7)).unwrap();
        assert_eq!(planned.selection.table, AnalyticsTable::Fact);
        assert!(planned.sql.starts_with("SELECT route, count() AS request_count_rc, "));
        assert!(planned.sql.contains("AND route != ''\nGROUP BY route\nORDER BY request_count_rc DESC\nLIMIT 20"));

        let planned = builder().build_report(&report(ReportKind::TopRoutes { limit: Some(5) }, 7)).unwrap();
        assert!(planned.sql.ends_with("LIMIT 5"));
    }

    #[test]
    fn test_top_routes_on_legacy_table() {
        let builder = QueryBuilder::new(Config {
            use_rollup_tables: false,
            ..Default::default()
        })
        .unwrap();
        let planned = builder.build_report(&report(ReportKind::TopRoutes { limit: None }, 7)).unwrap();
        assert_eq!(planned.selection.table, AnalyticsTable::LegacyFact);
        assert!(planned.sql.starts_with("SELECT path AS route, "));
        assert!(planned.sql.contains("GROUP BY route\n"));
    }

    #[test]
    fn test_client_analytics() {
        let planned = builder()
            .build_report(&report(
                ReportKind::ClientAnalytics {
                    dimension: ClientDimension::Browser,
                },
                7,
            ))
            .unwrap();
        assert!(planned.sql.starts_with("SELECT browser, count() AS request_count_rc, "));
        assert!(planned.sql.contains("GROUP BY browser\n"));
    }

    #[test]
    fn test_latency_histogram() {
        let builder = QueryBuilder::new(Config {
            reports: crate::config::ReportConfig {
                histogram_bucket_bounds_ms: vec![100, 500],
                ..Default::default()
            },
            ..Default::default()
        })
        .unwrap();
        let planned = builder.build_report(&report(ReportKind::LatencyHistogram, 1)).unwrap();
        assert!(planned.sql.starts_with(
            "SELECT multiIf(response_time_ms < 100, '<100ms', response_time_ms < 500, '100-500ms', '>=500ms') AS latency_bucket, "
        ));
        assert!(planned.sql.ends_with("GROUP BY latency_bucket\nORDER BY min_latency_ms"));
    }

    #[test]
    fn test_sync_reports() {
        let planned = builder().build_report(&report(ReportKind::CredentialSync, 1)).unwrap();
        assert!(planned.sql.starts_with("SELECT api_key_id, max(timestamp) AS last_used_at, count() AS request_count_rc\n"));

        let planned = builder().build_report(&report(ReportKind::UserSync, 1)).unwrap();
        assert!(planned.sql.contains("min(timestamp) AS first_seen_at, max(timestamp) AS last_seen_at"));
        assert!(planned.sql.contains("AND user_id != ''\n"));
    }

    #[test]
    fn test_usage_summary_uses_rollups() {
        let planned = builder().build_report(&report(ReportKind::UsageSummary, 90)).unwrap();
        assert_eq!(planned.selection.table, AnalyticsTable::Rollup1d);
        assert!(planned.sql.contains("sum(cost_sum) AS total_cost"));
        assert!(planned.sql.contains("sum(unique_users_daily) AS unique_users"));
        assert!(!planned.sql.contains("GROUP BY"));

        let planned = builder().build_report(&report(ReportKind::UsageSummary, 10)).unwrap();
        assert_eq!(planned.selection.table, AnalyticsTable::Rollup1h);
        assert!(planned.sql.contains("uniqMerge(unique_users_state) AS unique_users"));
    }

    #[test]
    fn test_usage_history() {
        let planned = builder()
            .build_report(&report(
                ReportKind::UsageHistory {
                    interval: QueryInterval::OneHour,
                },
                3,
            ))
            .unwrap();
        assert_eq!(planned.selection.table, AnalyticsTable::Rollup5m);
        assert!(planned.sql.starts_with("SELECT toStartOfHour(ts) AS time_bucket, "));
    }

    #[test]
    fn test_usage_by_project_and_bulk() {
        let planned = builder().build_report(&report(ReportKind::UsageByProject, 10)).unwrap();
        assert!(planned.sql.contains("GROUP BY project_id\n"));

        let planned = builder()
            .build_report(&report(
                ReportKind::BulkUsage {
                    project_ids: vec!["a".into(), "b'c".into()],
                },
                10,
            ))
            .unwrap();
        assert!(planned.sql.contains("project_id IN ('a','b''c')"));

        let err = builder()
            .build_report(&report(ReportKind::BulkUsage { project_ids: vec![] }, 10))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRequest { .. }));
    }

    #[test]
    fn test_inverted_range() {
        let mut query = report(ReportKind::UserSync, 1);
        query.to_date = query.from_date - Duration::days(1);
        assert!(matches!(builder().build_report(&query), Err(Error::InvalidRequest { .. })));
    }
}
