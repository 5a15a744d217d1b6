use crate::tables::AnalyticsTable;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Metric name not present in the catalog (only raised in strict mode)
    #[error("Unknown metric: {metric}")]
    UnknownMetric { metric: String },

    /// Interval name outside the supported set
    #[error("Unknown interval: {interval}")]
    UnknownInterval { interval: String },

    /// Filter key that doesn't name a known logical field (strict mode)
    #[error("Unknown filter field: {field}")]
    UnknownFilterField { field: String },

    /// Group-by dimension that doesn't name a known logical field (strict mode)
    #[error("Unknown dimension: {dimension}")]
    UnknownDimension { dimension: String },

    /// Sort field outside the sortable set (strict mode)
    #[error("Unknown sort field: {field}")]
    UnknownSortField { field: String },

    /// The selected table has no column for the requested dimension (strict mode)
    #[error("Dimension {dimension} is not available on table {table}")]
    UnsupportedDimension { dimension: String, table: AnalyticsTable },

    /// Metric only has a definition over raw fact rows
    #[error("Metric {metric} can only be computed from raw rows, not from {table}")]
    MetricRequiresRawData { metric: String, table: AnalyticsTable },

    /// Request is malformed in a way no table choice can fix
    #[error("{message}")]
    InvalidRequest { message: String },

    /// Configuration failed validation
    #[error("Invalid configuration: {message}")]
    Config { message: String },

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Whether the caller sent something we can't plan, as opposed to a fault on our side.
    ///
    /// The request layer maps this to a 4xx.
    pub fn is_client_error(&self) -> bool {
        match self {
            Error::UnknownMetric { .. }
            | Error::UnknownInterval { .. }
            | Error::UnknownFilterField { .. }
            | Error::UnknownDimension { .. }
            | Error::UnknownSortField { .. }
            | Error::UnsupportedDimension { .. }
            | Error::MetricRequiresRawData { .. }
            | Error::InvalidRequest { .. } => true,
            Error::Config { .. } | Error::Other(_) => false,
        }
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Error::InvalidRequest { message: message.into() }
    }
}

/// Type alias for planner results
pub type Result<T> = std::result::Result<T, Error>;
