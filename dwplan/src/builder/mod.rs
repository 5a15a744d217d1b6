//! Query assembly for every query shape the planner produces.
//!
//! The builder never picks a table for metric and geo queries on its own: it is handed a
//! [`TableSelectionResult`] and renders the query that is correct for that table's storage.
//! Row-level queries (lists, counts, most reports) always read the detail table.

mod reports;
mod statement;

use chrono::{DateTime, Utc};
use std::str::FromStr;

use crate::config::{Config, Strictness};
use crate::errors::{Error, Result};
use crate::filters::{build_field_conditions, build_filter_conditions, resolve_column};
use crate::metrics::{MetricCompiler, known_metrics};
use crate::models::{GeoQuery, ListQuery, MetricsQuery, SortDirection};
use crate::selector::{TableSelectionResult, TableSelector};
use crate::sql::{build_time_bucket, quote, time_literal};
use crate::tables::{AnalyticsTable, LogicalField};

pub(crate) use statement::SelectStatement;

/// Fixed measures reported for every geographic bucket.
const GEO_METRICS: [&str; 6] = ["request_count", "success_rate", "latency_avg", "unique_users", "total_tokens", "cost"];

/// Columns every list row carries that are named the same on both raw tables.
const LIST_COLUMNS: [&str; 8] = [
    "request_id",
    "is_success",
    "response_time_ms",
    "ttft_ms",
    "input_tokens",
    "output_tokens",
    "cost",
    "cache_hit",
];

/// Mapped dimensions included in every list row, aliased to their canonical names.
const LIST_FIELDS: [LogicalField; 8] = [
    LogicalField::Timestamp,
    LogicalField::Project,
    LogicalField::Endpoint,
    LogicalField::Model,
    LogicalField::ModelProvider,
    LogicalField::StatusCode,
    LogicalField::User,
    LogicalField::ApiKey,
];

/// Fields a request list can be sorted on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    Timestamp,
    Latency,
    Ttft,
    InputTokens,
    OutputTokens,
    TotalTokens,
    Cost,
    StatusCode,
    Model,
}

impl SortField {
    /// Physical sort expression on a raw table.
    fn expression(&self, table: AnalyticsTable) -> &'static str {
        match self {
            SortField::Timestamp => table.timestamp_column(),
            SortField::Latency => "response_time_ms",
            SortField::Ttft => "ttft_ms",
            SortField::InputTokens => "input_tokens",
            SortField::OutputTokens => "output_tokens",
            SortField::TotalTokens => "(input_tokens + output_tokens)",
            SortField::Cost => "cost",
            SortField::StatusCode => "status_code",
            SortField::Model => table.column(LogicalField::Model).unwrap_or("model"),
        }
    }
}

impl FromStr for SortField {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "timestamp" | "created_at" => Ok(SortField::Timestamp),
            "latency" | "response_time_ms" => Ok(SortField::Latency),
            "ttft" | "ttft_ms" => Ok(SortField::Ttft),
            "input_tokens" => Ok(SortField::InputTokens),
            "output_tokens" => Ok(SortField::OutputTokens),
            "total_tokens" => Ok(SortField::TotalTokens),
            "cost" => Ok(SortField::Cost),
            "status_code" => Ok(SortField::StatusCode),
            "model" => Ok(SortField::Model),
            _ => Err(()),
        }
    }
}

/// A resolved group-by column: what goes into SELECT and the name GROUP BY refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
struct GroupColumn {
    select: String,
    key: &'static str,
}

/// Builds query strings from a configuration snapshot.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    config: Config,
    selector: TableSelector,
}

impl QueryBuilder {
    /// Table names are interpolated unquoted and page/limit settings feed `clamp`, so the
    /// configuration is validated before anything is built from it.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_validated(config))
    }

    /// Caller guarantees `config.validate()` passes.
    pub(crate) fn from_validated(config: Config) -> Self {
        let selector = TableSelector::new(config.use_rollup_tables);
        Self { config, selector }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn selector(&self) -> &TableSelector {
        &self.selector
    }

    fn strictness(&self) -> Strictness {
        self.config.strictness()
    }

    fn table_name(&self, table: AnalyticsTable) -> &str {
        self.config.tables.name(table)
    }

    fn compiler(&self) -> MetricCompiler<'_> {
        MetricCompiler::new(&self.config.tables, self.strictness())
    }

    /// Route a metrics request. Detail is needed when the caller asks for it or any recognised
    /// metric has no rollup rendering.
    pub fn route_metrics(&self, query: &MetricsQuery) -> TableSelectionResult {
        let detailed = query.requires_detailed_data || requires_detailed_data(&query.metrics);
        self.selector
            .select_metrics_table(query.interval, query.from_date, query.to_date, detailed)
    }

    pub fn route_geo(&self, query: &GeoQuery) -> TableSelectionResult {
        self.selector
            .select_geo_table(query.from_date, query.to_date, query.requires_detailed_data)
    }

    /// Metrics per time bucket, optionally split by dimensions.
    pub fn build_time_series_query(&self, selection: &TableSelectionResult, query: &MetricsQuery) -> Result<String> {
        validate_range(query.from_date, query.to_date)?;
        let table = selection.table;
        let metric_selects = self.metric_selects(selection, query, true)?;
        let groups = self.resolve_group_by(table, &query.group_by)?;

        let mut statement = SelectStatement::from(self.table_name(table))
            .select(format!("{} AS time_bucket", build_time_bucket(query.interval, table)))
            .select_all(metric_selects)
            .select_all(groups.iter().map(|g| g.select.clone()))
            .filter_all(build_filter_conditions(table, query.from_date, query.to_date, &query.filters, self.strictness())?)
            .group_by(std::iter::once("time_bucket".to_string()).chain(groups.iter().map(|g| g.key.to_string())))
            .order_by("time_bucket");
        for group in &groups {
            statement = statement.order_by(group.key);
        }
        Ok(statement.build())
    }

    /// Metrics over the whole range, optionally split by dimensions.
    pub fn build_aggregated_query(&self, selection: &TableSelectionResult, query: &MetricsQuery) -> Result<String> {
        validate_range(query.from_date, query.to_date)?;
        let table = selection.table;
        let metric_selects = self.metric_selects(selection, query, false)?;
        let groups = self.resolve_group_by(table, &query.group_by)?;

        let mut statement = SelectStatement::from(self.table_name(table))
            .select_all(metric_selects)
            .select_all(groups.iter().map(|g| g.select.clone()))
            .filter_all(build_filter_conditions(table, query.from_date, query.to_date, &query.filters, self.strictness())?)
            .group_by(groups.iter().map(|g| g.key.to_string()));
        for group in &groups {
            statement = statement.order_by(group.key);
        }
        Ok(statement.build())
    }

    /// Fixed measures per country, region or city. Rows without a country are left out.
    pub fn build_geo_query(&self, selection: &TableSelectionResult, query: &GeoQuery) -> Result<String> {
        validate_range(query.from_date, query.to_date)?;
        let table = selection.table;
        let metrics: Vec<String> = GEO_METRICS.iter().map(|m| m.to_string()).collect();
        let metric_selects = self.compiler().build_metric_selects(
            table,
            &metrics,
            selection.requires_merge_functions,
            Some(query.from_date),
            Some(query.to_date),
        )?;

        let mut groups = Vec::with_capacity(3);
        for field in query.group_by_level.fields() {
            groups.push(self.group_column(table, *field)?);
        }
        let country = resolve_column(table, LogicalField::Country, self.strictness())?;

        Ok(SelectStatement::from(self.table_name(table))
            .select_all(groups.iter().map(|g| g.select.clone()))
            .select_all(metric_selects)
            .filter_all(build_filter_conditions(table, query.from_date, query.to_date, &query.filters, self.strictness())?)
            .filter(format!("{country} != ''"))
            .group_by(groups.iter().map(|g| g.key.to_string()))
            .order_by("request_count_rc DESC")
            .build())
    }

    /// One page of individual requests with truncated text previews.
    pub fn build_list_query(&self, table: AnalyticsTable, query: &ListQuery) -> Result<String> {
        let list = &self.config.list;

        let sort_field = match query.sort_by.as_deref() {
            None => SortField::default(),
            Some(name) => match name.parse::<SortField>() {
                Ok(field) => field,
                Err(()) => {
                    self.strictness()
                        .reject(Error::UnknownSortField { field: name.to_string() })?;
                    SortField::default()
                }
            },
        };

        let mut columns = Vec::with_capacity(LIST_FIELDS.len() + LIST_COLUMNS.len() + 4);
        for field in LIST_FIELDS {
            columns.push(self.group_column(table, field)?.select);
        }
        columns.extend(LIST_COLUMNS.iter().map(|c| c.to_string()));
        columns.push(format!("substringUTF8(prompt, 1, {}) AS prompt_preview", list.prompt_preview_chars));
        columns.push(format!("substringUTF8(response, 1, {}) AS response_preview", list.response_preview_chars));
        columns.push(format!(
            "substringUTF8(system_prompt, 1, {}) AS system_prompt_preview",
            list.system_prompt_preview_chars
        ));
        columns.push("JSONExtractString(metadata, 'session_id') AS session_id".to_string());

        let limit = query
            .limit
            .unwrap_or(i64::from(list.default_page_size))
            .clamp(1, i64::from(list.max_page_size));
        let offset = query.offset.unwrap_or(0).max(0);

        let mut statement = SelectStatement::from(self.table_name(table))
            .select_all(columns)
            .filter_all(self.list_conditions(table, query)?)
            .order_by(format!("{} {}", sort_field.expression(table), query.sort_direction.as_sql()));
        // newest first among ties
        if sort_field != SortField::Timestamp {
            statement = statement.order_by(format!("{} {}", table.timestamp_column(), SortDirection::Desc.as_sql()));
        }

        Ok(statement.limit(limit as u64).offset(offset as u64).build())
    }

    /// Total rows a list request matches, ignoring pagination.
    pub fn build_count_query(&self, table: AnalyticsTable, query: &ListQuery) -> Result<String> {
        Ok(SelectStatement::from(self.table_name(table))
            .select("count() AS total")
            .filter_all(self.list_conditions(table, query)?)
            .build())
    }

    fn list_conditions(&self, table: AnalyticsTable, query: &ListQuery) -> Result<Vec<String>> {
        if let (Some(from), Some(to)) = (query.from_date, query.to_date) {
            validate_range(from, to)?;
        }

        let ts = table.timestamp_column();
        let mut conditions = Vec::new();
        if let Some(from) = query.from_date {
            conditions.push(format!("{ts} >= {}", time_literal(table, from)));
        }
        if let Some(to) = query.to_date {
            conditions.push(format!("{ts} <= {}", time_literal(table, to)));
        }
        conditions.extend(build_field_conditions(table, &query.filters, self.strictness())?);
        if let Some(search) = query.search.as_deref().filter(|s| !s.is_empty()) {
            conditions.push(format!("positionCaseInsensitiveUTF8(prompt, {}) > 0", quote(search)));
        }
        Ok(conditions)
    }

    /// `bucketed` renders rates per `query.interval` bucket rather than over the whole range.
    fn metric_selects(&self, selection: &TableSelectionResult, query: &MetricsQuery, bucketed: bool) -> Result<Vec<String>> {
        if query.metrics.is_empty() {
            return Err(Error::invalid("at least one metric is required"));
        }
        let compiler = if bucketed {
            self.compiler().per_bucket(query.interval)
        } else {
            self.compiler()
        };
        let selects = compiler.build_metric_selects(
            selection.table,
            &query.metrics,
            selection.requires_merge_functions,
            Some(query.from_date),
            Some(query.to_date),
        )?;
        if selects.is_empty() {
            return Err(Error::invalid(format!(
                "none of the requested metrics are known: {}",
                query.metrics.join(", ")
            )));
        }
        Ok(selects)
    }

    /// Resolve group-by names in order, dropping duplicates.
    fn resolve_group_by(&self, table: AnalyticsTable, dimensions: &[String]) -> Result<Vec<GroupColumn>> {
        let mut groups: Vec<GroupColumn> = Vec::with_capacity(dimensions.len());
        for dimension in dimensions {
            let Ok(field) = dimension.parse::<LogicalField>() else {
                self.strictness().reject(Error::UnknownDimension {
                    dimension: dimension.clone(),
                })?;
                continue;
            };
            let column = self.group_column(table, field)?;
            if !groups.iter().any(|g| g.key == column.key) {
                groups.push(column);
            }
        }
        Ok(groups)
    }

    fn group_column(&self, table: AnalyticsTable, field: LogicalField) -> Result<GroupColumn> {
        let column = resolve_column(table, field, self.strictness())?;
        let key = field.as_str();
        let select = if column == key {
            column.to_string()
        } else {
            format!("{column} AS {key}")
        };
        Ok(GroupColumn { select, key })
    }
}

fn validate_range(from_date: DateTime<Utc>, to_date: DateTime<Utc>) -> Result<()> {
    if from_date > to_date {
        return Err(Error::invalid(format!(
            "from_date ({from_date}) must not be after to_date ({to_date})"
        )));
    }
    Ok(())
}

/// Whether any of the named metrics forces the fact table.
pub fn requires_detailed_data(metrics: &[String]) -> bool {
    known_metrics(metrics).any(|m| m.requires_detailed_data())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::{FilterValue, Filters};
    use crate::interval::QueryInterval;
    use crate::models::GeoLevel;
    use chrono::{Duration, TimeZone};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn metrics_query(metrics: &[&str], interval: QueryInterval, hours: i64) -> MetricsQuery {
        MetricsQuery {
            metrics: metrics.iter().map(|m| m.to_string()).collect(),
            from_date: start(),
            to_date: start() + Duration::hours(hours),
            interval,
            filters: Filters::new(),
            group_by: vec![],
            requires_detailed_data: false,
        }
    }

    fn builder() -> QueryBuilder {
        QueryBuilder::new(Config::default()).unwrap()
    }

    fn strict_builder() -> QueryBuilder {
        QueryBuilder::new(Config {
            strict_mode: true,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_new_validates_config() {
        let mut config = Config::default();
        config.tables.rollup_1h = "metrics_1h UNION ALL SELECT 1".into();
        assert!(matches!(QueryBuilder::new(config), Err(Error::Config { .. })));

        let mut config = Config::default();
        config.list.max_page_size = 0;
        config.list.default_page_size = 0;
        assert!(matches!(QueryBuilder::new(config), Err(Error::Config { .. })));
    }

    #[test]
    fn test_time_series_on_five_minute_rollup() {
        let builder = builder();
        let mut query = metrics_query(&["request_count", "success_rate"], QueryInterval::FiveMinutes, 2);
        query.filters.insert("project_id".into(), FilterValue::from(vec!["P1"]));

        let selection = builder.route_metrics(&query);
        assert_eq!(selection.table, AnalyticsTable::Rollup5m);

        let sql = builder.build_time_series_query(&selection, &query).unwrap();
        assert_eq!(
            sql,
            "SELECT toStartOfFiveMinutes(ts) AS time_bucket, sum(request_count) AS request_count_rc, \
             if(sum(request_count) > 0, sum(success_count)*100.0/sum(request_count), 0) AS success_rate\n\
             FROM inference_metrics_5m\n\
             WHERE ts >= toDateTime('2024-01-01 00:00:00', 'UTC') AND ts <= toDateTime('2024-01-01 02:00:00', 'UTC') \
             AND project_id IN ('P1')\n\
             GROUP BY time_bucket\n\
             ORDER BY time_bucket"
        );
    }

    #[test]
    fn test_requests_per_minute_per_bucket_in_time_series() {
        let builder = builder();
        let query = metrics_query(&["requests_per_minute"], QueryInterval::OneHour, 48);
        let selection = builder.route_metrics(&query);

        let series = builder.build_time_series_query(&selection, &query).unwrap();
        assert!(series.contains("sum(request_count) / 60 AS requests_per_minute"));

        let summary = builder.build_aggregated_query(&selection, &query).unwrap();
        assert!(summary.contains("sum(request_count) / 2880 AS requests_per_minute"));
    }

    #[test]
    fn test_time_series_group_by_aliases_legacy_columns() {
        let builder = QueryBuilder::new(Config {
            use_rollup_tables: false,
            ..Default::default()
        })
        .unwrap();
        let mut query = metrics_query(&["request_count"], QueryInterval::OneHour, 24);
        query.group_by = vec!["model".into(), "provider".into(), "model_provider".into()];

        let selection = builder.route_metrics(&query);
        assert_eq!(selection.table, AnalyticsTable::LegacyFact);

        let sql = builder.build_time_series_query(&selection, &query).unwrap();
        assert!(sql.starts_with("SELECT toStartOfHour(created_at) AS time_bucket, count() AS request_count_rc, model_name AS model, provider AS model_provider\n"));
        assert!(sql.contains("GROUP BY time_bucket, model, model_provider\n"));
        assert!(sql.ends_with("ORDER BY time_bucket, model, model_provider"));
    }

    #[test]
    fn test_percentile_metric_routes_to_fact_table() {
        let builder = builder();
        let query = metrics_query(&["request_count", "latency_p95"], QueryInterval::OneDay, 24 * 90);
        let selection = builder.route_metrics(&query);
        assert_eq!(selection.table, AnalyticsTable::Fact);

        let sql = builder.build_time_series_query(&selection, &query).unwrap();
        assert!(sql.contains("quantile(0.95)(response_time_ms) AS latency_p95"));
        assert!(!sql.contains("Merge"));
        assert!(sql.contains("FROM inference_requests\n"));
    }

    #[test]
    fn test_daily_rollup_bucket_and_dates() {
        let builder = builder();
        let query = metrics_query(&["request_count"], QueryInterval::OneDay, 24 * 60);
        let selection = builder.route_metrics(&query);
        assert_eq!(selection.table, AnalyticsTable::Rollup1d);

        let sql = builder.build_time_series_query(&selection, &query).unwrap();
        assert!(sql.contains("toStartOfDay(toDateTime(ts)) AS time_bucket"));
        assert!(sql.contains("ts >= toDate('2024-01-01') AND ts <= toDate('2024-03-01')"));
    }

    #[test]
    fn test_aggregated_query() {
        let builder = builder();
        let mut query = metrics_query(&["cost", "latency_avg"], QueryInterval::OneHour, 24 * 14);
        query.group_by = vec!["project".into()];
        let selection = builder.route_metrics(&query);
        assert_eq!(selection.table, AnalyticsTable::Rollup1h);

        let sql = builder.build_aggregated_query(&selection, &query).unwrap();
        assert!(sql.starts_with("SELECT sum(cost_sum) AS total_cost, "));
        assert!(sql.contains(", project_id\nFROM inference_metrics_1h\n"));
        assert!(sql.contains("GROUP BY project_id\nORDER BY project_id"));
        assert!(!sql.contains("time_bucket"));
    }

    #[test]
    fn test_aggregated_query_without_groups() {
        let builder = builder();
        let query = metrics_query(&["request_count"], QueryInterval::OneHour, 2);
        let selection = builder.route_metrics(&query);
        let sql = builder.build_aggregated_query(&selection, &query).unwrap();
        assert!(!sql.contains("GROUP BY"));
        assert!(!sql.contains("ORDER BY"));
    }

    #[test]
    fn test_invalid_metric_requests() {
        let builder = builder();
        let query = metrics_query(&[], QueryInterval::OneHour, 2);
        let selection = builder.route_metrics(&query);
        assert!(matches!(
            builder.build_time_series_query(&selection, &query),
            Err(Error::InvalidRequest { .. })
        ));

        let query = metrics_query(&["bogus"], QueryInterval::OneHour, 2);
        assert!(matches!(
            builder.build_aggregated_query(&selection, &query),
            Err(Error::InvalidRequest { .. })
        ));

        let mut query = metrics_query(&["request_count"], QueryInterval::OneHour, 2);
        query.to_date = query.from_date - Duration::hours(1);
        assert!(matches!(
            builder.build_time_series_query(&selection, &query),
            Err(Error::InvalidRequest { .. })
        ));
    }

    #[test_log::test]
    fn test_group_by_strictness() {
        let mut query = metrics_query(&["request_count"], QueryInterval::OneHour, 2);
        query.group_by = vec!["user".into()];

        // rollups carry no user column
        let selection = builder().route_metrics(&query);
        let sql = builder().build_aggregated_query(&selection, &query).unwrap();
        assert!(sql.contains("GROUP BY user_id"));
        assert!(matches!(
            strict_builder().build_aggregated_query(&selection, &query),
            Err(Error::UnsupportedDimension { .. })
        ));

        query.group_by = vec!["nonsense".into()];
        let sql = builder().build_aggregated_query(&selection, &query).unwrap();
        assert!(!sql.contains("nonsense"));
        assert!(matches!(
            strict_builder().build_aggregated_query(&selection, &query),
            Err(Error::UnknownDimension { .. })
        ));
    }

    #[test]
    fn test_geo_query_on_rollup() {
        let builder = builder();
        let query = GeoQuery {
            from_date: start(),
            to_date: start() + Duration::days(3),
            filters: Filters::new(),
            group_by_level: GeoLevel::Region,
            requires_detailed_data: false,
        };
        let selection = builder.route_geo(&query);
        assert_eq!(selection.table, AnalyticsTable::Geo1h);

        let sql = builder.build_geo_query(&selection, &query).unwrap();
        assert!(sql.starts_with("SELECT country_code, region, sum(request_count) AS request_count_rc, "));
        assert!(sql.contains("uniqMerge(unique_users_state) AS unique_users"));
        assert!(sql.contains("FROM inference_geo_1h\n"));
        assert!(sql.contains("AND country_code != ''\n"));
        assert!(sql.contains("GROUP BY country_code, region\n"));
        assert!(sql.ends_with("ORDER BY request_count_rc DESC"));
    }

    #[test]
    fn test_geo_query_on_raw_rows() {
        let builder = builder();
        let query = GeoQuery {
            from_date: start(),
            to_date: start() + Duration::days(3),
            filters: Filters::new(),
            group_by_level: GeoLevel::City,
            requires_detailed_data: true,
        };
        let selection = builder.route_geo(&query);
        assert_eq!(selection.table, AnalyticsTable::Fact);

        let sql = builder.build_geo_query(&selection, &query).unwrap();
        assert!(sql.starts_with("SELECT country_code, region, city, count() AS request_count_rc, "));
        assert!(sql.contains("uniqExact(user_id) AS unique_users"));
        assert!(!sql.contains("Merge"));
    }

    #[test]
    fn test_list_query_defaults() {
        let sql = builder().build_list_query(AnalyticsTable::Fact, &ListQuery::default()).unwrap();
        assert!(sql.contains("substringUTF8(prompt, 1, 200) AS prompt_preview"));
        assert!(sql.contains("substringUTF8(system_prompt, 1, 100) AS system_prompt_preview"));
        assert!(sql.contains("JSONExtractString(metadata, 'session_id') AS session_id"));
        assert!(!sql.contains("WHERE"));
        assert!(sql.ends_with("ORDER BY timestamp DESC\nLIMIT 50\nOFFSET 0"));
    }

    #[test]
    fn test_list_query_sort_search_and_paging() {
        let query = ListQuery {
            from_date: Some(start()),
            sort_by: Some("latency".into()),
            sort_direction: SortDirection::Asc,
            limit: Some(100_000),
            offset: Some(-5),
            search: Some("it's".into()),
            ..Default::default()
        };
        let sql = builder().build_list_query(AnalyticsTable::Fact, &query).unwrap();
        assert!(sql.contains("WHERE timestamp >= toDateTime('2024-01-01 00:00:00', 'UTC') AND positionCaseInsensitiveUTF8(prompt, 'it''s') > 0\n"));
        assert!(sql.ends_with("ORDER BY response_time_ms ASC, timestamp DESC\nLIMIT 1000\nOFFSET 0"));
    }

    #[test]
    fn test_list_query_on_legacy_table() {
        let query = ListQuery {
            sort_by: Some("model".into()),
            ..Default::default()
        };
        let sql = builder().build_list_query(AnalyticsTable::LegacyFact, &query).unwrap();
        assert!(sql.starts_with("SELECT created_at AS timestamp, project_id, endpoint_id, model_name AS model, provider AS model_provider, "));
        assert!(sql.contains("FROM http_analytics\n"));
        assert!(sql.contains("ORDER BY model_name DESC, created_at DESC"));
    }

    #[test_log::test]
    fn test_unknown_sort_field() {
        let query = ListQuery {
            sort_by: Some("prompt; DROP TABLE x".into()),
            ..Default::default()
        };
        let sql = builder().build_list_query(AnalyticsTable::Fact, &query).unwrap();
        assert!(sql.contains("ORDER BY timestamp DESC"));
        assert!(!sql.contains("DROP"));

        assert!(matches!(
            strict_builder().build_list_query(AnalyticsTable::Fact, &query),
            Err(Error::UnknownSortField { .. })
        ));
    }

    #[test]
    fn test_count_query() {
        let mut filters = Filters::new();
        filters.insert("status_code".into(), FilterValue::from(vec!["500"]));
        let query = ListQuery {
            from_date: Some(start()),
            to_date: Some(start() + Duration::days(1)),
            filters,
            limit: Some(10),
            ..Default::default()
        };
        let sql = builder().build_count_query(AnalyticsTable::Fact, &query).unwrap();
        assert_eq!(
            sql,
            "SELECT count() AS total\nFROM inference_requests\n\
             WHERE timestamp >= toDateTime('2024-01-01 00:00:00', 'UTC') AND timestamp <= toDateTime('2024-01-02 00:00:00', 'UTC') \
             AND status_code IN ('500')"
        );
    }

    #[test]
    fn test_requires_detailed_data() {
        assert!(requires_detailed_data(&["request_count".into(), "ttft_p95".into()]));
        assert!(!requires_detailed_data(&["request_count".into(), "bogus".into()]));
    }
}
