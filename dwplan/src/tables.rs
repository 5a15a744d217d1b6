//! Physical analytics tables and their column layouts.
//!
//! The store keeps one raw fact table (one row per inference request) and a set of rollups
//! pre-aggregated into fixed time buckets. Rollups drop dimensions that would blow up their
//! cardinality, so the column mapping is partial: [`AnalyticsTable::column`] returns `None`
//! when a table has no column for a logical field.
//!
//! | Table        | Default name           | Storage                        |
//! |--------------|------------------------|--------------------------------|
//! | `Fact`       | `inference_requests`   | raw rows                       |
//! | `Rollup5m`   | `inference_metrics_5m` | partial sums, sketches, digests|
//! | `Rollup1h`   | `inference_metrics_1h` | partial sums, sketches, digests|
//! | `Rollup1d`   | `inference_metrics_1d` | finalized daily scalars        |
//! | `Geo1h`      | `inference_geo_1h`     | partial sums, sketches         |
//! | `LegacyFact` | `http_analytics`       | raw rows                       |
//! | `LegacyGeo`  | `http_analytics_geo`   | raw rows                       |

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Every table a planned query can read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnalyticsTable {
    #[serde(rename = "fact")]
    Fact,
    #[serde(rename = "rollup_5m")]
    Rollup5m,
    #[serde(rename = "rollup_1h")]
    Rollup1h,
    #[serde(rename = "rollup_1d")]
    Rollup1d,
    #[serde(rename = "geo_1h")]
    Geo1h,
    #[serde(rename = "legacy_fact")]
    LegacyFact,
    #[serde(rename = "legacy_geo")]
    LegacyGeo,
}

/// How a table stores its measures, which decides the aggregate functions valid over it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Storage {
    /// One row per request, finished values
    Raw,
    /// Partial sums/counts, uniq sketches and t-digests that still need merging
    MergeState,
    /// Per-bucket finished scalars (sums, counts and already-computed percentiles)
    Finalized,
}

impl AnalyticsTable {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalyticsTable::Fact => "fact",
            AnalyticsTable::Rollup5m => "rollup_5m",
            AnalyticsTable::Rollup1h => "rollup_1h",
            AnalyticsTable::Rollup1d => "rollup_1d",
            AnalyticsTable::Geo1h => "geo_1h",
            AnalyticsTable::LegacyFact => "legacy_fact",
            AnalyticsTable::LegacyGeo => "legacy_geo",
        }
    }

    /// Physical table name used when the configuration doesn't override it
    pub fn default_name(&self) -> &'static str {
        match self {
            AnalyticsTable::Fact => "inference_requests",
            AnalyticsTable::Rollup5m => "inference_metrics_5m",
            AnalyticsTable::Rollup1h => "inference_metrics_1h",
            AnalyticsTable::Rollup1d => "inference_metrics_1d",
            AnalyticsTable::Geo1h => "inference_geo_1h",
            AnalyticsTable::LegacyFact => "http_analytics",
            AnalyticsTable::LegacyGeo => "http_analytics_geo",
        }
    }

    pub fn storage(&self) -> Storage {
        match self {
            AnalyticsTable::Fact | AnalyticsTable::LegacyFact | AnalyticsTable::LegacyGeo => Storage::Raw,
            AnalyticsTable::Rollup5m | AnalyticsTable::Rollup1h | AnalyticsTable::Geo1h => Storage::MergeState,
            AnalyticsTable::Rollup1d => Storage::Finalized,
        }
    }

    pub fn is_rollup(&self) -> bool {
        self.storage() != Storage::Raw
    }

    /// The daily rollup keys rows by `Date`; everything else uses `DateTime`.
    pub fn has_date_timestamp(&self) -> bool {
        matches!(self, AnalyticsTable::Rollup1d)
    }

    /// Timestamp column. Every table has one.
    pub fn timestamp_column(&self) -> &'static str {
        match self {
            AnalyticsTable::Fact => "timestamp",
            AnalyticsTable::Rollup5m | AnalyticsTable::Rollup1h | AnalyticsTable::Rollup1d | AnalyticsTable::Geo1h => "ts",
            AnalyticsTable::LegacyFact | AnalyticsTable::LegacyGeo => "created_at",
        }
    }

    /// Physical column for a logical field, or `None` when the table doesn't carry it.
    pub fn column(&self, field: LogicalField) -> Option<&'static str> {
        use AnalyticsTable::*;
        use LogicalField as F;

        match (self, field) {
            (_, F::Timestamp) => Some(self.timestamp_column()),

            (Fact, F::Project) => Some("project_id"),
            (Fact, F::Endpoint) => Some("endpoint_id"),
            (Fact, F::Model) => Some("model"),
            (Fact, F::ModelProvider) => Some("model_provider"),
            (Fact, F::StatusCode) => Some("status_code"),
            (Fact, F::User) => Some("user_id"),
            (Fact, F::ApiKey) => Some("api_key_id"),
            (Fact, F::Country) => Some("country_code"),
            (Fact, F::Region) => Some("region"),
            (Fact, F::City) => Some("city"),
            (Fact, F::Route) => Some("route"),
            (Fact, F::DeviceType) => Some("device_type"),
            (Fact, F::Browser) => Some("browser"),
            (Fact, F::Os) => Some("os"),

            (Rollup5m | Rollup1h, F::Project) => Some("project_id"),
            (Rollup5m | Rollup1h, F::Endpoint) => Some("endpoint_id"),
            (Rollup5m | Rollup1h, F::Model) => Some("model"),
            (Rollup5m | Rollup1h, F::ModelProvider) => Some("model_provider"),

            // The daily rollup is keyed on (ts, project, endpoint, model) only.
            (Rollup1d, F::Project) => Some("project_id"),
            (Rollup1d, F::Endpoint) => Some("endpoint_id"),
            (Rollup1d, F::Model) => Some("model"),

            (Geo1h, F::Project) => Some("project_id"),
            (Geo1h, F::Endpoint) => Some("endpoint_id"),
            (Geo1h, F::Country) => Some("country_code"),
            (Geo1h, F::Region) => Some("region"),
            (Geo1h, F::City) => Some("city"),

            (LegacyFact, F::Project) => Some("project_id"),
            (LegacyFact, F::Endpoint) => Some("endpoint_id"),
            (LegacyFact, F::Model) => Some("model_name"),
            (LegacyFact, F::ModelProvider) => Some("provider"),
            (LegacyFact, F::StatusCode) => Some("status_code"),
            (LegacyFact, F::User) => Some("user_id"),
            (LegacyFact, F::ApiKey) => Some("api_key_id"),
            (LegacyFact, F::Route) => Some("path"),

            (LegacyGeo, F::Project) => Some("project_id"),
            (LegacyGeo, F::Endpoint) => Some("endpoint_id"),
            (LegacyGeo, F::User) => Some("user_id"),
            (LegacyGeo, F::Country) => Some("country_code"),
            (LegacyGeo, F::Region) => Some("region"),
            (LegacyGeo, F::City) => Some("city"),

            _ => None,
        }
    }
}

impl fmt::Display for AnalyticsTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dimensions a request can filter or group on, independent of any table's naming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalField {
    Project,
    Endpoint,
    Model,
    ModelProvider,
    Timestamp,
    StatusCode,
    User,
    ApiKey,
    Country,
    Region,
    City,
    Route,
    DeviceType,
    Browser,
    Os,
}

impl LogicalField {
    /// Canonical output name; group columns are aliased to this so results look the same
    /// whichever table served them.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogicalField::Project => "project_id",
            LogicalField::Endpoint => "endpoint_id",
            LogicalField::Model => "model",
            LogicalField::ModelProvider => "model_provider",
            LogicalField::Timestamp => "timestamp",
            LogicalField::StatusCode => "status_code",
            LogicalField::User => "user_id",
            LogicalField::ApiKey => "api_key_id",
            LogicalField::Country => "country_code",
            LogicalField::Region => "region",
            LogicalField::City => "city",
            LogicalField::Route => "route",
            LogicalField::DeviceType => "device_type",
            LogicalField::Browser => "browser",
            LogicalField::Os => "os",
        }
    }
}

impl fmt::Display for LogicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogicalField {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "project" | "project_id" => Ok(LogicalField::Project),
            "endpoint" | "endpoint_id" => Ok(LogicalField::Endpoint),
            "model" => Ok(LogicalField::Model),
            "model_provider" | "provider" => Ok(LogicalField::ModelProvider),
            "timestamp" => Ok(LogicalField::Timestamp),
            "status_code" | "status" => Ok(LogicalField::StatusCode),
            "user" | "user_id" => Ok(LogicalField::User),
            "api_key" | "api_key_id" | "credential" => Ok(LogicalField::ApiKey),
            "country" | "country_code" => Ok(LogicalField::Country),
            "region" => Ok(LogicalField::Region),
            "city" => Ok(LogicalField::City),
            "route" | "path" => Ok(LogicalField::Route),
            "device_type" | "device" => Ok(LogicalField::DeviceType),
            "browser" => Ok(LogicalField::Browser),
            "os" => Ok(LogicalField::Os),
            _ => Err(()),
        }
    }
}
