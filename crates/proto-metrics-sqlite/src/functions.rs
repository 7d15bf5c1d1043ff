// crates/proto-metrics-sqlite/src/functions.rs
// ============================================================================
// Module: SQLite Metric Functions
// Description: Registers the proto encoder as SQLite scalar and aggregate functions.
// Purpose: Let metric scripts build nested protos and repeated fields in SQL.
// Dependencies: proto-metrics-core, rusqlite
// ============================================================================

//! ## Overview
//! Every registered message type gets a variadic build-proto function named
//! after its short name. `RepeatedField` aggregates a column into a repeated
//! envelope, `RUN_METRIC` queues a helper script, and `UNWRAP_METRIC_PROTO`
//! and `NULL_IF_EMPTY` expose the envelope helpers. All functions delegate to
//! the engine-agnostic boundary in `proto-metrics-core`; this module only
//! converts values and errors.
//!
//! `RUN_METRIC` cannot execute statements while the calling statement is still
//! stepping, so it renders the script eagerly and pushes the result onto a
//! shared queue that the engine drains once the calling statement finishes.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;

use proto_metrics_core::MetricCatalog;
use proto_metrics_core::MetricsError;
use proto_metrics_core::PreparedRun;
use proto_metrics_core::RepeatedFieldBuilder;
use proto_metrics_core::SchemaRegistry;
use proto_metrics_core::SqlValue;
use proto_metrics_core::build_proto;
use proto_metrics_core::null_if_empty;
use proto_metrics_core::prepare_run_metric;
use proto_metrics_core::unwrap_metric_proto;
use rusqlite::Connection;
use rusqlite::functions::Aggregate;
use rusqlite::functions::Context;
use rusqlite::functions::FunctionFlags;
use rusqlite::types::Null;
use rusqlite::types::ValueRef;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Aggregate collecting a column into a repeated field envelope.
pub const REPEATED_FIELD_FUNCTION: &str = "RepeatedField";
/// Scalar queueing a helper script for execution.
pub const RUN_METRIC_FUNCTION: &str = "RUN_METRIC";
/// Scalar extracting the payload of a single-message envelope.
pub const UNWRAP_METRIC_PROTO_FUNCTION: &str = "UNWRAP_METRIC_PROTO";
/// Scalar mapping empty blobs to NULL.
pub const NULL_IF_EMPTY_FUNCTION: &str = "NULL_IF_EMPTY";

// ============================================================================
// SECTION: Pending Runs
// ============================================================================

/// Run-metric calls waiting for their calling statement to finish.
pub(crate) type PendingRuns = Arc<Mutex<VecDeque<PreparedRun>>>;

/// Removes and returns every queued run in call order.
pub(crate) fn take_pending(pending: &PendingRuns) -> Result<Vec<PreparedRun>, MetricsError> {
    let mut queue = pending.lock().map_err(|_| poisoned_queue())?;
    Ok(queue.drain(..).collect())
}

/// Discards queued runs left behind by a failed statement.
pub(crate) fn clear_pending(pending: &PendingRuns) {
    if let Ok(mut queue) = pending.lock() {
        queue.clear();
    }
}

/// Error reported when the pending queue lock is poisoned.
fn poisoned_queue() -> MetricsError {
    MetricsError::Engine("RUN_METRIC: pending run queue is poisoned".to_string())
}

// ============================================================================
// SECTION: Registration
// ============================================================================

/// Registers every metric function on `connection`.
///
/// Build-proto functions are registered in full-name order and the first
/// message claiming a short name keeps it; SQLite function names are matched
/// case-insensitively. Returns the registered build-proto function names.
///
/// # Errors
///
/// Returns [`rusqlite::Error`] when SQLite rejects a registration.
pub(crate) fn register_functions(
    connection: &Connection,
    registry: &Arc<SchemaRegistry>,
    catalog: &Arc<MetricCatalog>,
    pending: &PendingRuns,
) -> rusqlite::Result<Vec<String>> {
    let names = register_build_proto_functions(connection, registry)?;
    connection.create_aggregate_function(
        REPEATED_FIELD_FUNCTION,
        1,
        deterministic(),
        RepeatedFieldAggregate,
    )?;
    register_run_metric(connection, catalog, pending)?;
    connection.create_scalar_function(UNWRAP_METRIC_PROTO_FUNCTION, -1, deterministic(), |ctx| {
        let args = context_values(ctx)?;
        unwrap_metric_proto(&args).map_err(user_error)
    })?;
    connection.create_scalar_function(NULL_IF_EMPTY_FUNCTION, 1, deterministic(), |ctx| {
        let value = value_from_ref(ctx.get_raw(0))?;
        let blob = null_if_empty(value).map_err(user_error)?;
        Ok(blob.map(<[u8]>::to_vec))
    })?;
    Ok(names)
}

/// Registers one build-proto function per message short name.
fn register_build_proto_functions(
    connection: &Connection,
    registry: &Arc<SchemaRegistry>,
) -> rusqlite::Result<Vec<String>> {
    let mut claimed = BTreeSet::new();
    let mut names = Vec::new();
    for descriptor in registry.messages() {
        let name = descriptor.short_name().to_string();
        if !claimed.insert(name.to_ascii_lowercase()) {
            continue;
        }
        let registry = Arc::clone(registry);
        let full_name = descriptor.full_name().to_string();
        connection.create_scalar_function(name.as_str(), -1, deterministic(), move |ctx| {
            let args = context_values(ctx)?;
            let descriptor = registry.message(&full_name).map_err(user_error)?;
            build_proto(&registry, descriptor, &args).map_err(user_error)
        })?;
        names.push(name);
    }
    Ok(names)
}

/// Registers the run-metric scalar, which queues work and returns NULL.
fn register_run_metric(
    connection: &Connection,
    catalog: &Arc<MetricCatalog>,
    pending: &PendingRuns,
) -> rusqlite::Result<()> {
    let catalog = Arc::clone(catalog);
    let pending = Arc::clone(pending);
    connection.create_scalar_function(
        RUN_METRIC_FUNCTION,
        -1,
        FunctionFlags::SQLITE_UTF8,
        move |ctx| {
            let args = context_values(ctx)?;
            let run = prepare_run_metric(&catalog, &args).map_err(user_error)?;
            pending.lock().map_err(|_| user_error(poisoned_queue()))?.push_back(run);
            Ok(Null)
        },
    )
}

/// Flags for functions whose output depends only on their inputs.
fn deterministic() -> FunctionFlags {
    FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC
}

// ============================================================================
// SECTION: Repeated Field Aggregate
// ============================================================================

/// Aggregate accumulating one value per row into a repeated envelope.
struct RepeatedFieldAggregate;

impl Aggregate<RepeatedFieldBuilder, Option<Vec<u8>>> for RepeatedFieldAggregate {
    fn init(&self, _ctx: &mut Context<'_>) -> rusqlite::Result<RepeatedFieldBuilder> {
        Ok(RepeatedFieldBuilder::new())
    }

    fn step(&self, ctx: &mut Context<'_>, accumulator: &mut RepeatedFieldBuilder) -> rusqlite::Result<()> {
        accumulator.add(value_from_ref(ctx.get_raw(0))?);
        Ok(())
    }

    fn finalize(
        &self,
        _ctx: &mut Context<'_>,
        accumulator: Option<RepeatedFieldBuilder>,
    ) -> rusqlite::Result<Option<Vec<u8>>> {
        // Groups with no rows produce NULL rather than an empty blob.
        Ok(accumulator.map(RepeatedFieldBuilder::finish).filter(|bytes| !bytes.is_empty()))
    }
}

// ============================================================================
// SECTION: Conversions
// ============================================================================

/// Collects every function argument as a borrowed [`SqlValue`].
fn context_values<'a>(ctx: &'a Context<'_>) -> rusqlite::Result<Vec<SqlValue<'a>>> {
    (0 .. ctx.len()).map(|index| value_from_ref(ctx.get_raw(index))).collect()
}

/// Converts a SQLite value reference into a [`SqlValue`].
///
/// # Errors
///
/// Returns [`rusqlite::Error::UserFunctionError`] when text is not UTF-8.
pub(crate) fn value_from_ref(value: ValueRef<'_>) -> rusqlite::Result<SqlValue<'_>> {
    Ok(match value {
        ValueRef::Null => SqlValue::Null,
        ValueRef::Integer(value) => SqlValue::Long(value),
        ValueRef::Real(value) => SqlValue::Double(value),
        ValueRef::Text(bytes) => SqlValue::String(
            std::str::from_utf8(bytes).map_err(|err| rusqlite::Error::UserFunctionError(Box::new(err)))?,
        ),
        ValueRef::Blob(bytes) => SqlValue::Bytes(bytes),
    })
}

/// Wraps a metrics error so SQLite reports its message verbatim.
fn user_error(error: MetricsError) -> rusqlite::Error {
    rusqlite::Error::UserFunctionError(Box::new(error))
}
