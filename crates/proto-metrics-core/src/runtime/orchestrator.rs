// crates/proto-metrics-core/src/runtime/orchestrator.rs
// ============================================================================
// Module: Metric Orchestrator
// Description: Runs metric scripts and assembles their outputs.
// Purpose: Produce the composite root message for a list of requested metrics.
// Dependencies: crate::audit, crate::core, crate::interfaces, crate::runtime
// ============================================================================

//! ## Overview
//! For each requested metric the orchestrator runs the script's statements,
//! reads its single-row, single-blob output table, and appends that blob to the
//! root message under the metric's field. Metrics run strictly in request
//! order and the first failure aborts the whole computation with no partial
//! output.
//!
//! An output table with zero rows marks the field present but empty.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use crate::audit::MetricsAuditEvent;
use crate::audit::MetricsAuditSink;
use crate::audit::NoopAuditSink;
use crate::core::MetricCatalog;
use crate::core::MetricsError;
use crate::core::MetricsResult;
use crate::core::OwnedSqlValue;
use crate::core::SchemaRegistry;
use crate::core::SqlMetricFile;
use crate::core::SqlValue;
use crate::interfaces::SqlEngine;
use crate::runtime::MessageBuilder;
use crate::runtime::boundary::PreparedRun;
use crate::runtime::boundary::prepare_run_metric;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Rows fetched from an output table; the second detects cardinality errors.
const OUTPUT_ROW_PROBE: usize = 2;

// ============================================================================
// SECTION: Orchestrator
// ============================================================================

/// Computes metrics into a composite root message.
///
/// # Invariants
/// - `root_message` resolves in `registry`.
#[derive(Clone)]
pub struct MetricOrchestrator {
    /// Schema used to resolve the root message and nested types.
    registry: Arc<SchemaRegistry>,
    /// Metric scripts available for computation.
    catalog: Arc<MetricCatalog>,
    /// Full name of the root message.
    root_message: String,
    /// Audit sink receiving step events.
    audit: Arc<dyn MetricsAuditSink>,
}

impl MetricOrchestrator {
    /// Creates an orchestrator for `root_message`.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::SchemaResolution`] when the root message is not
    /// registered.
    pub fn new(
        registry: Arc<SchemaRegistry>,
        catalog: Arc<MetricCatalog>,
        root_message: impl Into<String>,
    ) -> MetricsResult<Self> {
        let root_message = root_message.into();
        registry.message(&root_message)?;
        Ok(Self {
            registry,
            catalog,
            root_message,
            audit: Arc::new(NoopAuditSink),
        })
    }

    /// Replaces the audit sink.
    #[must_use]
    pub fn with_audit(mut self, audit: Arc<dyn MetricsAuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Returns the schema registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    /// Returns the metric catalog.
    #[must_use]
    pub fn catalog(&self) -> &Arc<MetricCatalog> {
        &self.catalog
    }

    /// Returns the root message name.
    #[must_use]
    pub fn root_message(&self) -> &str {
        &self.root_message
    }

    /// Returns the audit sink.
    #[must_use]
    pub fn audit(&self) -> &Arc<dyn MetricsAuditSink> {
        &self.audit
    }

    /// Computes `metric_names` in order and returns the serialized root message.
    ///
    /// # Errors
    ///
    /// Returns the first [`MetricsError`] raised by lookup, script execution,
    /// output validation, or field encoding.
    pub fn compute<E, S>(&self, engine: &mut E, metric_names: &[S]) -> MetricsResult<Vec<u8>>
    where
        E: SqlEngine + ?Sized,
        S: AsRef<str>,
    {
        let mut builder = MessageBuilder::for_message(&self.registry, &self.root_message)?;
        for name in metric_names {
            let name = name.as_ref();
            match self.compute_metric(engine, &mut builder, name) {
                Ok(output_bytes) => {
                    self.audit.record(&MetricsAuditEvent::metric_computed(name, output_bytes));
                }
                Err(err) => {
                    self.audit.record(&MetricsAuditEvent::metric_failed(name, &err));
                    return Err(err);
                }
            }
        }
        let output = builder.serialize_raw();
        self.audit
            .record(&MetricsAuditEvent::compute_completed(metric_names.len(), output.len()));
        Ok(output)
    }

    /// Runs a parameterized script for side effects.
    ///
    /// `args` follow the run-metric calling convention: the script path, then
    /// alternating parameter names and values.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError`] when arguments are invalid, the script is
    /// unknown, a placeholder is unmapped, or a statement fails.
    pub fn run_metric<E>(&self, engine: &mut E, args: &[SqlValue<'_>]) -> MetricsResult<()>
    where
        E: SqlEngine + ?Sized,
    {
        let run = prepare_run_metric(&self.catalog, args)?;
        run_prepared(engine, &run, self.audit.as_ref())
    }

    /// Runs one metric and appends its output; returns the output size.
    fn compute_metric<E>(
        &self,
        engine: &mut E,
        builder: &mut MessageBuilder<'_>,
        name: &str,
    ) -> MetricsResult<usize>
    where
        E: SqlEngine + ?Sized,
    {
        let Some(file) = self.catalog.find_by_field(name) else {
            return Err(MetricsError::UnknownMetric(format!("Unknown metric {name}")));
        };
        for (index, statement) in file.statements().into_iter().enumerate() {
            engine.execute(statement)?;
            self.audit.record(&MetricsAuditEvent::statement_executed(name, index, statement.len()));
        }

        let table = output_table(file)?;
        let output = engine.query(&format!("SELECT * FROM {table};"), OUTPUT_ROW_PROBE)?;
        self.audit.record(&MetricsAuditEvent::output_queried(name, table, output.rows.len()));

        let Some(first) = output.rows.first() else {
            builder.append(name, SqlValue::Bytes(&[]))?;
            return Ok(0);
        };
        if output.column_count != 1 {
            return Err(MetricsError::Cardinality(format!(
                "Output table {table} should have exactly one column"
            )));
        }
        let Some(OwnedSqlValue::Bytes(bytes)) = first.first() else {
            return Err(MetricsError::TypeMismatch(format!(
                "Output table {table} column has invalid type"
            )));
        };
        if output.rows.len() > 1 {
            return Err(MetricsError::Cardinality(format!(
                "Output table {table} should have at most one row"
            )));
        }
        builder.append(name, SqlValue::Bytes(bytes))?;
        Ok(bytes.len())
    }
}

/// Returns the output table of an orchestrated metric.
fn output_table(file: &SqlMetricFile) -> MetricsResult<&str> {
    file.output_table_name.as_deref().ok_or_else(|| {
        MetricsError::SchemaResolution(format!("Metric {} has no output table", file.path))
    })
}

// ============================================================================
// SECTION: Run Metric Execution
// ============================================================================

/// Executes the rendered statements of a run-metric call in order.
///
/// Engine failures are reported against the script path.
///
/// # Errors
///
/// Returns [`MetricsError::Engine`] for the first failing statement.
pub fn run_prepared<E>(engine: &mut E, run: &PreparedRun, audit: &dyn MetricsAuditSink) -> MetricsResult<()>
where
    E: SqlEngine + ?Sized,
{
    for statement in &run.statements {
        engine.execute(statement).map_err(|err| {
            MetricsError::Engine(format!("RUN_METRIC: Error when running file {}: {err}", run.path))
        })?;
    }
    audit.record(&MetricsAuditEvent::run_metric(&run.path, run.statements.len()));
    Ok(())
}
