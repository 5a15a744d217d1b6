//! # dwplan: Query Planner for Inference Analytics
//!
//! `dwplan` decides, for every analytics request, which table of the inference analytics store
//! to read and generates the ClickHouse aggregation query that is correct for how that table
//! stores its data. It does not execute queries, own an HTTP surface or manage schemas: callers
//! hand it a normalized request and get back SQL plus the routing decision behind it.
//!
//! ## Overview
//!
//! Dashboards over a billion request records can't scan raw rows on every refresh. The store
//! therefore keeps one raw fact table next to rollups pre-aggregated into 5-minute, hourly and
//! daily buckets, plus an hourly geographic rollup. Answering a request means two decisions:
//!
//! - **Where to read.** The [`selector`] picks the cheapest table that still answers the request
//!   at the asked-for precision, looking only at bucket width, range width and whether the
//!   request needs per-request detail (percentiles, exact distinct users, concurrency).
//! - **How to aggregate.** The same logical metric needs different SQL per table. Rollup rows
//!   are themselves aggregates of unequal size, so averages become sum-of-sums over
//!   sum-of-counts, distinct counts merge sketches and percentiles merge t-digests. The
//!   [`metrics`] compiler owns those renderings.
//!
//! The [`builder`] assembles complete queries (time series, summaries, geographic breakdowns,
//! request lists and counts, fixed reports) and the [`planner`] ties routing and building
//! together behind one process-wide [`QueryPlanner`].
//!
//! ## Safety of generated SQL
//!
//! Queries are plain strings. Identifiers only ever come from closed enums ([`tables`]); every
//! value from a request passes through [`sql::quote`]. Unknown metric, filter, dimension and
//! sort names are dropped with a warning by default, or rejected when `strict_mode` is on.
//!
//! ## Configuration
//!
//! See [`config`]: a YAML file plus `DWPLAN_`-prefixed environment overrides, loaded with
//! figment.

pub mod builder;
pub mod config;
pub mod errors;
pub mod filters;
pub mod interval;
pub mod metrics;
pub mod models;
pub mod planner;
pub mod selector;
pub mod sql;
pub mod tables;
pub mod telemetry;

pub use builder::QueryBuilder;
pub use config::Config;
pub use errors::{Error, Result};
pub use interval::QueryInterval;
pub use metrics::Metric;
pub use models::{GeoQuery, ListQuery, MetricsQuery, PlanRequest, PlannedQuery, ReportQuery};
pub use planner::{QueryPlanner, init_planner, planner};
pub use selector::{TableSelectionResult, TableSelector};
pub use tables::AnalyticsTable;
