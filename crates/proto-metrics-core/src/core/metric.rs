// crates/proto-metrics-core/src/core/metric.rs
// ============================================================================
// Module: Metric Catalog
// Description: SQL metric scripts and their output bindings.
// Purpose: Locate metric scripts by proto field name or by path.
// Dependencies: serde, crate::core::error
// ============================================================================

//! ## Overview
//! A [`SqlMetricFile`] is one independently authored SQL script. Scripts that
//! name a proto field are orchestration targets; scripts without one are
//! side-effect scripts reachable only through run-metric. The catalog enforces
//! unique paths and unique field names at construction.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use serde::Serialize;

use crate::core::error::MetricsError;
use crate::core::error::MetricsResult;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Suffix appended to a field name to derive the default output table.
pub const OUTPUT_TABLE_SUFFIX: &str = "_output";
/// Statement separator used to split metric scripts.
pub const STATEMENT_SEPARATOR: &str = ";\n";

// ============================================================================
// SECTION: Metric Files
// ============================================================================

/// One SQL metric script.
///
/// # Invariants
/// - When `proto_field_name` is set, `output_table_name` is set too.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SqlMetricFile {
    /// Script identifier, used by run-metric lookups.
    pub path: String,
    /// Raw SQL script text.
    pub sql: String,
    /// Table holding the script's single output row.
    pub output_table_name: Option<String>,
    /// Root message field receiving the output.
    pub proto_field_name: Option<String>,
}

impl SqlMetricFile {
    /// Creates a metric file, deriving `<field>_output` when no table is given.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::SchemaResolution`] when the output table is not a
    /// plain SQL identifier.
    pub fn new(
        path: impl Into<String>,
        sql: impl Into<String>,
        output_table_name: Option<String>,
        proto_field_name: Option<String>,
    ) -> MetricsResult<Self> {
        let path = path.into();
        let output_table_name = match (output_table_name, &proto_field_name) {
            (Some(table), _) => Some(table),
            (None, Some(field)) => Some(format!("{field}{OUTPUT_TABLE_SUFFIX}")),
            (None, None) => None,
        };
        if let Some(table) = &output_table_name
            && !is_sql_identifier(table)
        {
            return Err(MetricsError::SchemaResolution(format!(
                "Output table {table} of metric {path} is not a valid identifier"
            )));
        }
        Ok(Self {
            path,
            sql: sql.into(),
            output_table_name,
            proto_field_name,
        })
    }

    /// Splits the script into trimmed, non-blank statements.
    #[must_use]
    pub fn statements(&self) -> Vec<&str> {
        split_statements(&self.sql)
    }
}

/// Splits SQL text on `;\n`, trimming leading whitespace and dropping blanks.
#[must_use]
pub fn split_statements(sql: &str) -> Vec<&str> {
    sql.split(STATEMENT_SEPARATOR)
        .map(str::trim_start)
        .filter(|statement| !statement.is_empty())
        .collect()
}

/// Returns true for `[A-Za-z_][A-Za-z0-9_]*`, optionally dot-qualified.
fn is_sql_identifier(value: &str) -> bool {
    !value.is_empty()
        && value.split('.').all(|part| {
            let mut chars = part.chars();
            chars.next().is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
                && chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
        })
}

// ============================================================================
// SECTION: Catalog
// ============================================================================

/// Catalog of metric scripts.
#[derive(Debug, Clone, Default)]
pub struct MetricCatalog {
    /// Metric files in registration order.
    files: Vec<SqlMetricFile>,
}

impl MetricCatalog {
    /// Builds a catalog, rejecting duplicate paths and field names.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::UnknownMetric`] when a path or field name is
    /// registered twice.
    pub fn new(files: Vec<SqlMetricFile>) -> MetricsResult<Self> {
        let mut paths = BTreeSet::new();
        let mut fields = BTreeSet::new();
        for file in &files {
            if !paths.insert(file.path.as_str()) {
                return Err(MetricsError::UnknownMetric(format!(
                    "Metric path {} is registered twice",
                    file.path
                )));
            }
            if let Some(field) = &file.proto_field_name
                && !fields.insert(field.as_str())
            {
                return Err(MetricsError::UnknownMetric(format!(
                    "Metric field {field} is produced by more than one script"
                )));
            }
        }
        Ok(Self {
            files,
        })
    }

    /// Finds the script producing a root message field.
    #[must_use]
    pub fn find_by_field(&self, field_name: &str) -> Option<&SqlMetricFile> {
        self.files.iter().find(|file| file.proto_field_name.as_deref() == Some(field_name))
    }

    /// Finds a script by path.
    #[must_use]
    pub fn find_by_path(&self, path: &str) -> Option<&SqlMetricFile> {
        self.files.iter().find(|file| file.path == path)
    }

    /// Returns all scripts in registration order.
    #[must_use]
    pub fn files(&self) -> &[SqlMetricFile] {
        &self.files
    }
}
