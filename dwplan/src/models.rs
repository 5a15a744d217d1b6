//! Request and response types for the planner.
//!
//! Requests arrive already normalized by the request layer: dates are parsed, the interval is
//! one of the supported names and metric names are plain strings (the planner decides what to
//! do with ones it doesn't know).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::filters::Filters;
use crate::interval::QueryInterval;
use crate::selector::TableSelectionResult;
use crate::tables::LogicalField;

/// Query parameters for time-series and summary metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsQuery {
    /// Logical metric names, in output order
    pub metrics: Vec<String>,

    /// Inclusive start of the range
    pub from_date: DateTime<Utc>,

    /// Inclusive end of the range
    pub to_date: DateTime<Utc>,

    /// Bucket width (default: 1h). Summaries use it for table routing only.
    #[serde(default)]
    pub interval: QueryInterval,

    /// Filter field -> scalar or list of values
    #[serde(default)]
    pub filters: Filters,

    /// Dimensions to group on, in order
    #[serde(default)]
    pub group_by: Vec<String>,

    /// Force the fact table whatever the metrics are
    #[serde(default)]
    pub requires_detailed_data: bool,
}

/// Depth of the geographic hierarchy to group on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeoLevel {
    #[default]
    Country,
    Region,
    City,
}

impl GeoLevel {
    /// Hierarchy fields from the top down to this level
    pub fn fields(&self) -> &'static [LogicalField] {
        static HIERARCHY: [LogicalField; 3] = [LogicalField::Country, LogicalField::Region, LogicalField::City];
        match self {
            GeoLevel::Country => &HIERARCHY[..1],
            GeoLevel::Region => &HIERARCHY[..2],
            GeoLevel::City => &HIERARCHY,
        }
    }
}

/// Query parameters for geographic breakdowns
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoQuery {
    pub from_date: DateTime<Utc>,
    pub to_date: DateTime<Utc>,
    #[serde(default)]
    pub filters: Filters,
    #[serde(default)]
    pub group_by_level: GeoLevel,
    #[serde(default)]
    pub requires_detailed_data: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Query parameters for listing individual requests (and counting them)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListQuery {
    /// Start of the range (default: unbounded)
    pub from_date: Option<DateTime<Utc>>,

    /// End of the range (default: unbounded)
    pub to_date: Option<DateTime<Utc>>,

    #[serde(default)]
    pub filters: Filters,

    /// Logical sort field (default: timestamp)
    pub sort_by: Option<String>,

    /// Sort direction (default: descending)
    #[serde(default)]
    pub sort_direction: SortDirection,

    /// Maximum number of rows to return (default and max from config)
    pub limit: Option<i64>,

    /// Number of rows to skip for pagination
    pub offset: Option<i64>,

    /// Case-insensitive substring to look for in the prompt
    pub search: Option<String>,
}

/// Client attribute the client-analytics report breaks down by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientDimension {
    #[default]
    DeviceType,
    Browser,
    Os,
}

impl ClientDimension {
    pub fn field(&self) -> LogicalField {
        match self {
            ClientDimension::DeviceType => LogicalField::DeviceType,
            ClientDimension::Browser => LogicalField::Browser,
            ClientDimension::Os => LogicalField::Os,
        }
    }
}

/// Fixed report templates
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "report", rename_all = "snake_case")]
pub enum ReportKind {
    /// Busiest routes with their error rate and latency
    TopRoutes {
        #[serde(default)]
        limit: Option<u32>,
    },
    /// Requests broken down by device type, browser or OS
    ClientAnalytics {
        #[serde(default)]
        dimension: ClientDimension,
    },
    /// Request counts per latency band
    LatencyHistogram,
    /// Last use and request count per API key
    CredentialSync,
    /// First and last activity per user
    UserSync,
    /// Totals for requests, tokens and cost over the range
    UsageSummary,
    /// Usage totals per time bucket
    UsageHistory {
        #[serde(default = "default_history_interval")]
        interval: QueryInterval,
    },
    /// Usage totals per project
    UsageByProject,
    /// Usage totals for an explicit set of projects
    BulkUsage { project_ids: Vec<String> },
}

fn default_history_interval() -> QueryInterval {
    QueryInterval::OneDay
}

impl ReportKind {
    pub fn name(&self) -> &'static str {
        match self {
            ReportKind::TopRoutes { .. } => "top_routes",
            ReportKind::ClientAnalytics { .. } => "client_analytics",
            ReportKind::LatencyHistogram => "latency_histogram",
            ReportKind::CredentialSync => "credential_sync",
            ReportKind::UserSync => "user_sync",
            ReportKind::UsageSummary => "usage_summary",
            ReportKind::UsageHistory { .. } => "usage_history",
            ReportKind::UsageByProject => "usage_by_project",
            ReportKind::BulkUsage { .. } => "bulk_usage",
        }
    }
}

/// Query parameters for a fixed report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportQuery {
    #[serde(flatten)]
    pub report: ReportKind,
    pub from_date: DateTime<Utc>,
    pub to_date: DateTime<Utc>,
    #[serde(default)]
    pub filters: Filters,
}

/// Any request the planner accepts, tagged by `kind`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlanRequest {
    TimeSeries(MetricsQuery),
    Summary(MetricsQuery),
    Geo(GeoQuery),
    List(ListQuery),
    Count(ListQuery),
    Report(ReportQuery),
}

/// A generated query together with the routing decision behind it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedQuery {
    pub sql: String,
    pub selection: TableSelectionResult,
}
