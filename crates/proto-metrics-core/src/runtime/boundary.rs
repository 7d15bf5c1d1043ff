// crates/proto-metrics-core/src/runtime/boundary.rs
// ============================================================================
// Module: SQL Boundary Entry Points
// Description: Argument handling for functions exposed to the SQL engine.
// Purpose: Keep engine hosts thin by validating arguments in one place.
// Dependencies: crate::core, crate::runtime
// ============================================================================

//! ## Overview
//! Each function here receives the raw argument list a SQL engine hands to a
//! registered function and returns either the result payload or a descriptive
//! error. Engine hosts only convert values in and results out.
//!
//! - `build_proto`: `(name, value, name, value, ...)` into one message.
//! - `prepare_run_metric`: `(path, key, value, ...)` into rendered statements.
//! - `unwrap_metric_proto`: `(blob, type_name)` into the inner payload.
//! - `null_if_empty`: `(blob)` into `None` when the blob is empty.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;

use crate::core::MessageDescriptor;
use crate::core::MetricCatalog;
use crate::core::MetricsError;
use crate::core::MetricsResult;
use crate::core::SchemaRegistry;
use crate::core::SqlValue;
use crate::runtime::MessageBuilder;
use crate::runtime::envelope;
use crate::runtime::template::render_template;

// ============================================================================
// SECTION: Build Proto
// ============================================================================

/// Builds one message from alternating field names and values.
///
/// The result is a single envelope, or an empty vector when no field was set.
/// It is never absent so the caller can still observe message presence.
///
/// # Errors
///
/// Returns [`MetricsError`] for an odd argument count, non-text field names, or
/// any field write failure.
pub fn build_proto(
    registry: &SchemaRegistry,
    descriptor: &MessageDescriptor,
    args: &[SqlValue<'_>],
) -> MetricsResult<Vec<u8>> {
    if args.len() % 2 != 0 {
        return Err(MetricsError::TypeMismatch(format!(
            "Invalid number of args to {} BuildProto (got {})",
            descriptor.full_name(),
            args.len()
        )));
    }
    let mut builder = MessageBuilder::new(registry, descriptor);
    for pair in args.chunks_exact(2) {
        let SqlValue::String(field_name) = pair[0] else {
            return Err(MetricsError::TypeMismatch(format!(
                "BuildProto: Invalid args (field name for {} must be text, was {})",
                descriptor.full_name(),
                pair[0].kind()
            )));
        };
        builder.append(field_name, pair[1])?;
    }
    Ok(builder.serialize_as_envelope())
}

// ============================================================================
// SECTION: Run Metric
// ============================================================================

/// Parameterized script ready for execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedRun {
    /// Path of the script that was rendered.
    pub path: String,
    /// Rendered statements in script order.
    pub statements: Vec<String>,
}

/// Resolves a run-metric call into rendered statements.
///
/// Every statement is rendered before any runs, so a missing parameter fails
/// the call without side effects.
///
/// # Errors
///
/// Returns [`MetricsError::Substitution`] for malformed arguments or missing
/// parameters and [`MetricsError::UnknownMetric`] for an unknown path.
pub fn prepare_run_metric(catalog: &MetricCatalog, args: &[SqlValue<'_>]) -> MetricsResult<PreparedRun> {
    let Some((SqlValue::String(path), params)) = args.split_first() else {
        return Err(MetricsError::Substitution("RUN_METRIC: Invalid arguments".to_string()));
    };
    let Some(file) = catalog.find_by_path(path) else {
        return Err(MetricsError::UnknownMetric(format!(
            "RUN_METRIC: Unknown filename provided ({path})"
        )));
    };
    let substitutions = substitutions_from_args(params)?;
    let mut statements = Vec::new();
    for statement in file.statements() {
        let rendered = render_template(statement, &substitutions).map_err(|err| {
            err.with_context(&format!(
                "RUN_METRIC: Error when performing substitutions in file {path}"
            ))
        })?;
        statements.push(rendered);
    }
    Ok(PreparedRun {
        path: (*path).to_string(),
        statements,
    })
}

/// Converts alternating key/value arguments into a substitution map.
fn substitutions_from_args(params: &[SqlValue<'_>]) -> MetricsResult<HashMap<String, String>> {
    if params.len() % 2 != 0 {
        return Err(MetricsError::Substitution(
            "RUN_METRIC: every key must be followed by a value".to_string(),
        ));
    }
    let mut substitutions = HashMap::with_capacity(params.len() / 2);
    for pair in params.chunks_exact(2) {
        let SqlValue::String(key) = pair[0] else {
            return Err(MetricsError::Substitution(
                "RUN_METRIC: all keys must be strings".to_string(),
            ));
        };
        let Some(value) = pair[1].to_template_text() else {
            return Err(MetricsError::Substitution(
                "RUN_METRIC: all values must be convertible to strings".to_string(),
            ));
        };
        substitutions.insert(key.to_string(), value);
    }
    Ok(substitutions)
}

// ============================================================================
// SECTION: Unwrap and Null Helpers
// ============================================================================

/// Extracts the payload of a single message envelope of the named type.
///
/// An empty blob unwraps to an empty payload.
///
/// # Errors
///
/// Returns [`MetricsError`] for a wrong argument count or kinds, or when the
/// envelope fails validation against `type_name`.
pub fn unwrap_metric_proto(args: &[SqlValue<'_>]) -> MetricsResult<Vec<u8>> {
    let [proto, message_type] = args else {
        return Err(MetricsError::TypeMismatch(
            "UNWRAP_METRIC_PROTO: Expected exactly proto and message type as arguments"
                .to_string(),
        ));
    };
    let SqlValue::Bytes(bytes) = *proto else {
        return Err(MetricsError::TypeMismatch(
            "UNWRAP_METRIC_PROTO: proto is not a blob".to_string(),
        ));
    };
    let SqlValue::String(type_name) = *message_type else {
        return Err(MetricsError::TypeMismatch(
            "UNWRAP_METRIC_PROTO: message type is not string".to_string(),
        ));
    };
    if bytes.is_empty() {
        return Ok(Vec::new());
    }
    envelope::decode_single_message(bytes, type_name)
        .map_err(|err| err.with_context("UNWRAP_METRIC_PROTO"))
}

/// Maps an empty blob to `None` and passes other blobs through.
///
/// # Errors
///
/// Returns [`MetricsError::TypeMismatch`] when the value is not a blob.
pub fn null_if_empty<'a>(value: SqlValue<'a>) -> MetricsResult<Option<&'a [u8]>> {
    match value {
        SqlValue::Bytes(bytes) if bytes.is_empty() => Ok(None),
        SqlValue::Bytes(bytes) => Ok(Some(bytes)),
        _ => Err(MetricsError::TypeMismatch(
            "NULL_IF_EMPTY: should only be called with bytes argument".to_string(),
        )),
    }
}
