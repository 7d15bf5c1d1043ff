// crates/proto-metrics-core/src/audit.rs
// ============================================================================
// Module: Metrics Audit Logging
// Description: Structured audit events for metric computation.
// Purpose: Emit JSON-line records of orchestration steps without hard deps.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! The orchestrator reports each step it takes (statement executed, output
//! queried, metric computed or failed) to a [`MetricsAuditSink`]. Sinks are
//! best-effort: a sink that cannot write drops the record and computation
//! continues.
//!
//! Statement text is never recorded. Events carry the statement index and its
//! length so logs stay small and free of embedded literals.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

use crate::core::MetricsError;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Metric computation audit event payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Metric field name or script path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric: Option<String>,
    /// Output table queried.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    /// Zero-based index of the statement within its script.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statement_index: Option<usize>,
    /// Statement length in bytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statement_bytes: Option<usize>,
    /// Rows observed in the output table (capped at two).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<usize>,
    /// Size of the produced payload in bytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_bytes: Option<usize>,
    /// Number of metrics covered by a completed computation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric_count: Option<usize>,
    /// Normalized error kind label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<&'static str>,
    /// Error message for failed steps.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MetricsAuditEvent {
    /// Creates an empty event with a consistent timestamp.
    fn new(event: &'static str) -> Self {
        let timestamp_ms =
            SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
        Self {
            event,
            timestamp_ms,
            metric: None,
            table: None,
            statement_index: None,
            statement_bytes: None,
            rows: None,
            output_bytes: None,
            metric_count: None,
            error_kind: None,
            error: None,
        }
    }

    /// A metric script statement ran successfully.
    #[must_use]
    pub fn statement_executed(metric: &str, statement_index: usize, statement_bytes: usize) -> Self {
        Self {
            metric: Some(metric.to_string()),
            statement_index: Some(statement_index),
            statement_bytes: Some(statement_bytes),
            ..Self::new("statement_executed")
        }
    }

    /// A metric output table was read.
    #[must_use]
    pub fn output_queried(metric: &str, table: &str, rows: usize) -> Self {
        Self {
            metric: Some(metric.to_string()),
            table: Some(table.to_string()),
            rows: Some(rows),
            ..Self::new("output_queried")
        }
    }

    /// A metric contributed its field to the root message.
    #[must_use]
    pub fn metric_computed(metric: &str, output_bytes: usize) -> Self {
        Self {
            metric: Some(metric.to_string()),
            output_bytes: Some(output_bytes),
            ..Self::new("metric_computed")
        }
    }

    /// A metric aborted the computation.
    #[must_use]
    pub fn metric_failed(metric: &str, error: &MetricsError) -> Self {
        Self {
            metric: Some(metric.to_string()),
            error_kind: Some(error.kind()),
            error: Some(error.message().to_string()),
            ..Self::new("metric_failed")
        }
    }

    /// A parameterized script ran for side effects.
    #[must_use]
    pub fn run_metric(path: &str, statement_count: usize) -> Self {
        Self {
            metric: Some(path.to_string()),
            metric_count: Some(statement_count),
            ..Self::new("run_metric")
        }
    }

    /// A full computation finished.
    #[must_use]
    pub fn compute_completed(metric_count: usize, output_bytes: usize) -> Self {
        Self {
            metric_count: Some(metric_count),
            output_bytes: Some(output_bytes),
            ..Self::new("compute_completed")
        }
    }
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Audit sink for metric computation events.
pub trait MetricsAuditSink: Send + Sync {
    /// Record an audit event.
    fn record(&self, event: &MetricsAuditEvent);
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl MetricsAuditSink for StderrAuditSink {
    fn record(&self, event: &MetricsAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

/// Audit sink that logs JSON lines to a file.
pub struct FileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl MetricsAuditSink for FileAuditSink {
    fn record(&self, event: &MetricsAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

/// No-op audit sink.
pub struct NoopAuditSink;

impl MetricsAuditSink for NoopAuditSink {
    fn record(&self, _event: &MetricsAuditEvent) {}
}
