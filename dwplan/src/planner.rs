//! The planner facade: route a request, build its query and report both.
//!
//! [`QueryPlanner`] holds the current configuration snapshot behind an [`ArcSwap`], so the
//! rollup flag or table names can be changed while other threads keep planning. Each call
//! loads one snapshot and uses it throughout, so a single plan never mixes two configurations.
//!
//! Most callers use the process-wide instance:
//!
//! ```no_run
//! use dwplan::{Config, init_planner, planner};
//!
//! init_planner(Config::default())?;
//! let plan = planner().plan_count(&Default::default())?;
//! println!("{}", plan.sql);
//! # Ok::<(), dwplan::errors::Error>(())
//! ```

use arc_swap::ArcSwap;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info, instrument};

use crate::builder::QueryBuilder;
use crate::config::Config;
use crate::errors::Result;
use crate::models::{GeoQuery, ListQuery, MetricsQuery, PlanRequest, PlannedQuery, ReportQuery};

static PLANNER: OnceLock<QueryPlanner> = OnceLock::new();

/// Install the process-wide planner. The configuration is validated even when an instance
/// already exists; later calls keep the first instance, use [`QueryPlanner::reconfigure`] to
/// change its configuration.
pub fn init_planner(config: Config) -> Result<&'static QueryPlanner> {
    config.validate()?;
    Ok(PLANNER.get_or_init(|| QueryPlanner::from_builder(QueryBuilder::from_validated(config))))
}

/// The process-wide planner, created with the default configuration if nothing installed one.
pub fn planner() -> &'static QueryPlanner {
    PLANNER.get_or_init(|| QueryPlanner::from_builder(QueryBuilder::from_validated(Config::default())))
}

pub struct QueryPlanner {
    state: ArcSwap<QueryBuilder>,
}

impl QueryPlanner {
    /// Create a planner, rejecting a configuration that fails validation.
    pub fn new(config: Config) -> Result<Self> {
        Ok(Self::from_builder(QueryBuilder::new(config)?))
    }

    fn from_builder(builder: QueryBuilder) -> Self {
        Self {
            state: ArcSwap::from_pointee(builder),
        }
    }

    /// Snapshot of the configuration currently in use
    pub fn config(&self) -> Config {
        self.state.load().config().clone()
    }

    /// Swap in a new configuration. Plans already in progress finish with the old one.
    pub fn reconfigure(&self, config: Config) -> Result<()> {
        config.validate()?;
        info!(
            use_rollup_tables = config.use_rollup_tables,
            strict_mode = config.strict_mode,
            "Planner reconfigured"
        );
        self.state.store(Arc::new(QueryBuilder::from_validated(config)));
        Ok(())
    }

    /// Toggle routing to the rollup tables, keeping the rest of the configuration.
    pub fn set_rollups_enabled(&self, enabled: bool) {
        self.state.rcu(|current| {
            let mut config = current.config().clone();
            config.use_rollup_tables = enabled;
            QueryBuilder::from_validated(config)
        });
        info!(enabled, "Rollup routing toggled");
    }

    /// Metrics per time bucket
    #[instrument(skip_all, fields(interval = %query.interval, metrics = ?query.metrics), err)]
    pub fn plan_time_series(&self, query: &MetricsQuery) -> Result<PlannedQuery> {
        let builder = self.state.load();
        let selection = builder.route_metrics(query);
        let sql = builder.build_time_series_query(&selection, query)?;
        debug!(table = %selection.table, "Planned time series");
        Ok(PlannedQuery { sql, selection })
    }

    /// Metrics over the whole range
    #[instrument(skip_all, fields(metrics = ?query.metrics), err)]
    pub fn plan_summary(&self, query: &MetricsQuery) -> Result<PlannedQuery> {
        let builder = self.state.load();
        let selection = builder.route_metrics(query);
        let sql = builder.build_aggregated_query(&selection, query)?;
        debug!(table = %selection.table, "Planned summary");
        Ok(PlannedQuery { sql, selection })
    }

    #[instrument(skip_all, fields(level = ?query.group_by_level), err)]
    pub fn plan_geo(&self, query: &GeoQuery) -> Result<PlannedQuery> {
        let builder = self.state.load();
        let selection = builder.route_geo(query);
        let sql = builder.build_geo_query(&selection, query)?;
        Ok(PlannedQuery { sql, selection })
    }

    #[instrument(skip_all, err)]
    pub fn plan_list(&self, query: &ListQuery) -> Result<PlannedQuery> {
        let builder = self.state.load();
        let selection = builder.selector().select_detail_table();
        let sql = builder.build_list_query(selection.table, query)?;
        Ok(PlannedQuery { sql, selection })
    }

    #[instrument(skip_all, err)]
    pub fn plan_count(&self, query: &ListQuery) -> Result<PlannedQuery> {
        let builder = self.state.load();
        let selection = builder.selector().select_detail_table();
        let sql = builder.build_count_query(selection.table, query)?;
        Ok(PlannedQuery { sql, selection })
    }

    #[instrument(skip_all, fields(report = query.report.name()), err)]
    pub fn plan_report(&self, query: &ReportQuery) -> Result<PlannedQuery> {
        self.state.load().build_report(query)
    }

    /// Plan any request
    pub fn plan(&self, request: &PlanRequest) -> Result<PlannedQuery> {
        match request {
            PlanRequest::TimeSeries(query) => self.plan_time_series(query),
            PlanRequest::Summary(query) => self.plan_summary(query),
            PlanRequest::Geo(query) => self.plan_geo(query),
            PlanRequest::List(query) => self.plan_list(query),
            PlanRequest::Count(query) => self.plan_count(query),
            PlanRequest::Report(query) => self.plan_report(query),
        }
    }
}
