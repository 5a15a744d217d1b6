//! Planner configuration.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The file path
//! defaults to `dwplan.yaml` but can be specified via the `-f` flag or the `DWPLAN_CONFIG`
//! environment variable. A missing file is fine: every field has a default.
//!
//! ## Loading Priority
//!
//! 1. **YAML config file** - Base configuration
//! 2. **Environment variables** - Variables prefixed with `DWPLAN_` override YAML values
//!
//! For nested values use double underscores, e.g. `DWPLAN_LIST__MAX_PAGE_SIZE=500`.
//!
//! ## Environment Variable Examples
//!
//! ```bash
//! # Route everything to the legacy tables
//! DWPLAN_USE_ROLLUP_TABLES=false
//!
//! # Reject unknown metrics, filters and dimensions instead of dropping them
//! DWPLAN_STRICT_MODE=true
//!
//! # Point the fact table at a different database
//! DWPLAN_TABLES__FACT=analytics.inference_requests
//! ```

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::{Error, Result};
use crate::tables::AnalyticsTable;

/// Simple CLI args - config file plus the request to plan
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "DWPLAN_CONFIG", default_value = "dwplan.yaml")]
    pub config: String,

    /// Validate configuration and exit without planning anything.
    #[arg(long)]
    pub validate: bool,

    /// JSON plan request to read (defaults to stdin)
    #[arg(short = 'r', long)]
    pub request: Option<String>,
}

/// Root planner configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Route queries to the rollup tables. When false every query degrades to the two legacy
    /// raw tables.
    pub use_rollup_tables: bool,
    /// Reject unknown metrics, filter fields, dimensions and sort fields with an error instead
    /// of dropping them with a warning.
    pub strict_mode: bool,
    /// Physical table names
    pub tables: TableNames,
    /// Paginated list settings
    pub list: ListConfig,
    /// Fixed report settings
    pub reports: ReportConfig,
    /// Log output format
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            use_rollup_tables: true,
            strict_mode: false,
            tables: TableNames::default(),
            list: ListConfig::default(),
            reports: ReportConfig::default(),
            log_format: LogFormat::Text,
        }
    }
}

/// What to do with names the planner doesn't recognise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strictness {
    /// Drop the offending item and log a warning
    #[default]
    Lenient,
    /// Fail the whole request
    Strict,
}

impl Strictness {
    /// In strict mode return `err`; otherwise log it and carry on.
    pub fn reject(self, err: Error) -> Result<()> {
        match self {
            Strictness::Strict => Err(err),
            Strictness::Lenient => {
                warn!("Ignoring: {err}");
                Ok(())
            }
        }
    }

    pub fn is_strict(self) -> bool {
        self == Strictness::Strict
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Physical table names. Interpolated into queries unquoted, so validated as identifiers.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct TableNames {
    pub fact: String,
    pub rollup_5m: String,
    pub rollup_1h: String,
    pub rollup_1d: String,
    pub geo_1h: String,
    pub legacy_fact: String,
    pub legacy_geo: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            fact: AnalyticsTable::Fact.default_name().to_string(),
            rollup_5m: AnalyticsTable::Rollup5m.default_name().to_string(),
            rollup_1h: AnalyticsTable::Rollup1h.default_name().to_string(),
            rollup_1d: AnalyticsTable::Rollup1d.default_name().to_string(),
            geo_1h: AnalyticsTable::Geo1h.default_name().to_string(),
            legacy_fact: AnalyticsTable::LegacyFact.default_name().to_string(),
            legacy_geo: AnalyticsTable::LegacyGeo.default_name().to_string(),
        }
    }
}

impl TableNames {
    pub fn name(&self, table: AnalyticsTable) -> &str {
        match table {
            AnalyticsTable::Fact => &self.fact,
            AnalyticsTable::Rollup5m => &self.rollup_5m,
            AnalyticsTable::Rollup1h => &self.rollup_1h,
            AnalyticsTable::Rollup1d => &self.rollup_1d,
            AnalyticsTable::Geo1h => &self.geo_1h,
            AnalyticsTable::LegacyFact => &self.legacy_fact,
            AnalyticsTable::LegacyGeo => &self.legacy_geo,
        }
    }

    fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [
            ("fact", self.fact.as_str()),
            ("rollup_5m", self.rollup_5m.as_str()),
            ("rollup_1h", self.rollup_1h.as_str()),
            ("rollup_1d", self.rollup_1d.as_str()),
            ("geo_1h", self.geo_1h.as_str()),
            ("legacy_fact", self.legacy_fact.as_str()),
            ("legacy_geo", self.legacy_geo.as_str()),
        ]
        .into_iter()
    }
}

/// Paginated list settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ListConfig {
    /// Page size used when the request doesn't give one
    pub default_page_size: u32,
    /// Upper bound on requested page sizes
    pub max_page_size: u32,
    /// Characters kept from the prompt in list previews
    pub prompt_preview_chars: u32,
    /// Characters kept from the response in list previews
    pub response_preview_chars: u32,
    /// Characters kept from the system prompt in list previews
    pub system_prompt_preview_chars: u32,
}

impl Default for ListConfig {
    fn default() -> Self {
        Self {
            default_page_size: 50,
            max_page_size: 1000,
            prompt_preview_chars: 200,
            response_preview_chars: 200,
            system_prompt_preview_chars: 100,
        }
    }
}

/// Fixed report settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReportConfig {
    /// Routes returned by the top-routes report unless the request asks for fewer
    pub top_routes_limit: u32,
    /// Upper bounds (exclusive, milliseconds) of the latency histogram buckets. A final
    /// open-ended bucket catches everything above the last bound.
    pub histogram_bucket_bounds_ms: Vec<u32>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            top_routes_limit: 20,
            histogram_bucket_bounds_ms: vec![100, 250, 500, 1000, 2500, 5000, 10000],
        }
    }
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> std::result::Result<Self, figment::Error> {
        let config: Self = Self::figment(args).extract()?;
        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            .merge(Yaml::file(&args.config))
            .merge(Env::prefixed("DWPLAN_").split("__").ignore(&["CONFIG"]))
    }

    pub fn strictness(&self) -> Strictness {
        if self.strict_mode { Strictness::Strict } else { Strictness::Lenient }
    }

    /// Validate the configuration for consistency
    pub fn validate(&self) -> Result<()> {
        for (key, name) in self.tables.iter() {
            if name.is_empty() {
                return Err(Error::Config {
                    message: format!("tables.{key} cannot be empty"),
                });
            }
            if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.') {
                return Err(Error::Config {
                    message: format!("tables.{key} ({name}) may only contain ASCII letters, digits, '_' and '.'"),
                });
            }
        }

        if self.list.default_page_size == 0 || self.list.max_page_size == 0 {
            return Err(Error::Config {
                message: "list.default_page_size and list.max_page_size must be positive".to_string(),
            });
        }

        if self.list.default_page_size > self.list.max_page_size {
            return Err(Error::Config {
                message: format!(
                    "list.default_page_size ({}) cannot be greater than list.max_page_size ({})",
                    self.list.default_page_size, self.list.max_page_size
                ),
            });
        }

        if self.reports.top_routes_limit == 0 {
            return Err(Error::Config {
                message: "reports.top_routes_limit must be positive".to_string(),
            });
        }

        let bounds = &self.reports.histogram_bucket_bounds_ms;
        if bounds.is_empty() {
            return Err(Error::Config {
                message: "reports.histogram_bucket_bounds_ms needs at least one bound".to_string(),
            });
        }
        if bounds[0] == 0 || !bounds.windows(2).all(|w| w[0] < w[1]) {
            return Err(Error::Config {
                message: "reports.histogram_bucket_bounds_ms must be positive and strictly increasing".to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    fn args(path: &str) -> Args {
        Args {
            config: path.to_string(),
            validate: false,
            request: None,
        }
    }

    #[test]
    fn test_defaults_without_file() {
        Jail::expect_with(|_jail| {
            let config = Config::load(&args("missing.yaml"))?;

            assert!(config.use_rollup_tables);
            assert!(!config.strict_mode);
            assert_eq!(config.strictness(), Strictness::Lenient);
            assert_eq!(config.tables.name(AnalyticsTable::Rollup5m), "inference_metrics_5m");
            assert_eq!(config.list.default_page_size, 50);
            assert_eq!(config.log_format, LogFormat::Text);
            Ok(())
        });
    }

    #[test]
    fn test_yaml_config() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "test.yaml",
                r#"
use_rollup_tables: false
strict_mode: true
tables:
  fact: analytics.inference_requests
list:
  max_page_size: 200
reports:
  histogram_bucket_bounds_ms: [50, 500]
log_format: json
"#,
            )?;

            let config = Config::load(&args("test.yaml"))?;

            assert!(!config.use_rollup_tables);
            assert_eq!(config.strictness(), Strictness::Strict);
            assert_eq!(config.tables.name(AnalyticsTable::Fact), "analytics.inference_requests");
            // untouched names keep their defaults
            assert_eq!(config.tables.name(AnalyticsTable::Geo1h), "inference_geo_1h");
            assert_eq!(config.list.max_page_size, 200);
            assert_eq!(config.list.default_page_size, 50);
            assert_eq!(config.reports.histogram_bucket_bounds_ms, vec![50, 500]);
            assert_eq!(config.log_format, LogFormat::Json);
            Ok(())
        });
    }

    #[test]
    fn test_env_override() {
        Jail::expect_with(|jail| {
            jail.create_file("test.yaml", "use_rollup_tables: true\n")?;
            jail.set_env("DWPLAN_USE_ROLLUP_TABLES", "false");
            jail.set_env("DWPLAN_LIST__DEFAULT_PAGE_SIZE", "25");

            let config = Config::load(&args("test.yaml"))?;

            assert!(!config.use_rollup_tables);
            assert_eq!(config.list.default_page_size, 25);
            Ok(())
        });
    }

    #[test]
    fn test_unknown_fields_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file("test.yaml", "use_rolup_tables: false\n")?;
            assert!(Config::load(&args("test.yaml")).is_err());
            Ok(())
        });
    }

    #[test]
    fn test_validate_table_names() {
        let mut config = Config::default();
        config.tables.rollup_1h = "metrics; DROP TABLE x".to_string();
        assert!(matches!(config.validate(), Err(Error::Config { .. })));

        config.tables.rollup_1h = String::new();
        assert!(matches!(config.validate(), Err(Error::Config { .. })));
    }

    #[test]
    fn test_validate_page_sizes() {
        let mut config = Config::default();
        config.list.default_page_size = 2000;
        assert!(config.validate().is_err());

        config.list.default_page_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_histogram_bounds() {
        let mut config = Config::default();
        config.reports.histogram_bucket_bounds_ms = vec![100, 100, 200];
        assert!(config.validate().is_err());

        config.reports.histogram_bucket_bounds_ms = vec![];
        assert!(config.validate().is_err());

        config.reports.histogram_bucket_bounds_ms = vec![0, 10];
        assert!(config.validate().is_err());

        assert!(Config::default().validate().is_ok());
    }

    #[test_log::test]
    fn test_lenient_strictness_swallows_error() {
        let err = Error::UnknownMetric { metric: "bogus".into() };
        assert!(Strictness::Lenient.reject(err).is_ok());

        let err = Error::UnknownMetric { metric: "bogus".into() };
        assert!(matches!(Strictness::Strict.reject(err), Err(Error::UnknownMetric { .. })));
    }
}
