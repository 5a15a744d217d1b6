//! Request filters and their translation into WHERE conditions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::Strictness;
use crate::errors::{Error, Result};
use crate::sql::{quote, time_range_condition};
use crate::tables::{AnalyticsTable, LogicalField};

/// Filters keyed by logical field name. Ordered so the same request always yields the same SQL.
pub type Filters = BTreeMap<String, FilterValue>;

/// A single filter value as it arrives from the request layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    List(Vec<Scalar>),
    Scalar(Scalar),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    /// SQL literal for this value. Only text needs escaping; non-finite floats can't match
    /// anything and render as NULL.
    pub fn to_sql(&self) -> String {
        match self {
            Scalar::Bool(b) => (if *b { "1" } else { "0" }).to_string(),
            Scalar::Int(i) => i.to_string(),
            Scalar::Float(f) if f.is_finite() => f.to_string(),
            Scalar::Float(_) => "NULL".to_string(),
            Scalar::Text(s) => quote(s),
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Text(value.to_string())
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::Scalar(value.into())
    }
}

impl From<Vec<&str>> for FilterValue {
    fn from(values: Vec<&str>) -> Self {
        FilterValue::List(values.into_iter().map(Scalar::from).collect())
    }
}

/// Resolve a logical field to the expression to use for it on `table`.
///
/// When the table lacks the column, strict mode fails; lenient mode falls back to the canonical
/// field name, which the engine rejects at execution time.
pub(crate) fn resolve_column(table: AnalyticsTable, field: LogicalField, strictness: Strictness) -> Result<&'static str> {
    match table.column(field) {
        Some(column) => Ok(column),
        None if strictness.is_strict() => Err(Error::UnsupportedDimension {
            dimension: field.to_string(),
            table,
        }),
        None => {
            tracing::warn!(dimension = %field, table = %table, "Dimension not available on table, query will fail downstream");
            Ok(field.as_str())
        }
    }
}

/// Build the WHERE conditions for a query: the inclusive time range first, then one condition
/// per filter. Lists become `IN (...)`, scalars become `= value`. An empty list matches nothing.
pub fn build_filter_conditions(
    table: AnalyticsTable,
    from_date: DateTime<Utc>,
    to_date: DateTime<Utc>,
    filters: &Filters,
    strictness: Strictness,
) -> Result<Vec<String>> {
    let mut conditions = vec![time_range_condition(table, from_date, to_date)];
    conditions.extend(build_field_conditions(table, filters, strictness)?);
    Ok(conditions)
}

/// One condition per filter, without any time bound.
pub fn build_field_conditions(table: AnalyticsTable, filters: &Filters, strictness: Strictness) -> Result<Vec<String>> {
    let mut conditions = Vec::with_capacity(filters.len());

    for (key, value) in filters {
        let Ok(field) = key.parse::<LogicalField>() else {
            strictness.reject(Error::UnknownFilterField { field: key.clone() })?;
            continue;
        };
        let column = resolve_column(table, field, strictness)?;

        match value {
            FilterValue::List(values) if values.is_empty() => conditions.push("0".to_string()),
            FilterValue::List(values) => {
                let rendered: Vec<String> = values.iter().map(Scalar::to_sql).collect();
                conditions.push(format!("{column} IN ({})", rendered.join(",")));
            }
            FilterValue::Scalar(value) => conditions.push(format!("{column} = {}", value.to_sql())),
        }
    }

    Ok(conditions)
}
