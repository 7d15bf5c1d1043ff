// crates/proto-metrics-sqlite/tests/common/mod.rs
// =============================================================================
// Module: SQLite Engine Test Helpers
// Description: Trace-style schema, metric scripts, and conforming decoders.
// Purpose: Share fixtures across the SQLite engine integration suites.
// =============================================================================

#![allow(
    dead_code,
    missing_docs,
    clippy::missing_docs_in_private_items,
    reason = "Test helpers are selectively used across suites."
)]

use std::sync::Arc;
use std::sync::Mutex;

use proto_metrics_core::FieldDescriptor;
use proto_metrics_core::MessageSpec;
use proto_metrics_core::MetricCatalog;
use proto_metrics_core::MetricOrchestrator;
use proto_metrics_core::MetricsAuditEvent;
use proto_metrics_core::MetricsAuditSink;
use proto_metrics_core::SchemaRegistry;
use proto_metrics_core::SqlMetricFile;
use proto_metrics_core::WireKind;
use proto_metrics_sqlite::SqliteEngine;

// ============================================================================
// SECTION: Schema
// ============================================================================

fn field(name: &str, number: u32, kind: WireKind, type_name: Option<&str>) -> FieldDescriptor {
    FieldDescriptor {
        name: name.to_string(),
        number,
        kind,
        repeated: false,
        type_name: type_name.map(str::to_string),
    }
}

fn repeated(mut field: FieldDescriptor) -> FieldDescriptor {
    field.repeated = true;
    field
}

/// Registry with a root message, a stats message, and a slice message.
pub fn trace_registry() -> SchemaRegistry {
    let slice = MessageSpec {
        name: "trace.Slice".to_string(),
        fields: vec![
            field("name", 1, WireKind::String, None),
            field("dur", 2, WireKind::Int64, None),
        ],
    };
    let stats = MessageSpec {
        name: "trace.SliceStats".to_string(),
        fields: vec![
            field("count", 1, WireKind::Int64, None),
            repeated(field("slices", 2, WireKind::Message, Some("trace.Slice"))),
            repeated(field("durations", 3, WireKind::Int64, None)),
        ],
    };
    let root = MessageSpec {
        name: "trace.TraceMetrics".to_string(),
        fields: vec![
            field("slice_stats", 1, WireKind::Message, Some("trace.SliceStats")),
            field("other", 2, WireKind::Message, Some("trace.Slice")),
            field("empty", 3, WireKind::Message, Some("trace.Slice")),
            field("twice", 4, WireKind::Message, Some("trace.Slice")),
        ],
    };
    SchemaRegistry::builder()
        .message(slice)
        .message(stats)
        .message(root)
        .build()
        .expect("trace registry")
}

// ============================================================================
// SECTION: Metric Scripts
// ============================================================================

const SLICE_STATS_SQL: &str = "CREATE TABLE slice_stats_output AS
SELECT SliceStats(
    'count', (SELECT COUNT(*) FROM slice),
    'slices', (SELECT RepeatedField(Slice('name', name, 'dur', dur))
               FROM (SELECT name, dur FROM slice ORDER BY name)),
    'durations', (SELECT RepeatedField(dur) FROM (SELECT dur FROM slice ORDER BY dur))
) AS proto;
";

const OTHER_SQL: &str = "SELECT RUN_METRIC('helpers/make_table.sql', 'name', 'other_source', 'value', 42);
CREATE TABLE other_output AS
SELECT Slice('name', 'from_helper', 'dur', (SELECT v FROM other_source)) AS proto;
";

const EMPTY_SQL: &str = "CREATE TABLE empty_output AS SELECT Slice('name', 'x') AS proto WHERE 0;\n";

const TWICE_SQL: &str = "CREATE TABLE twice_output AS SELECT Slice('dur', dur) AS proto FROM slice;\n";

const MAKE_TABLE_SQL: &str = "CREATE TABLE {{name}} AS SELECT {{value}} AS v;\n";

const NESTED_SQL: &str = "SELECT RUN_METRIC('helpers/make_table.sql', 'name', '{{name}}', 'value', 1);
CREATE TABLE {{name}}_copy AS SELECT v + 1 AS v FROM {{name}};
";

const BROKEN_SQL: &str = "SELECT * FROM missing_table;\n";

const LOOP_SQL: &str = "SELECT RUN_METRIC('helpers/loop.sql');\n";

fn metric(path: &str, sql: &str, field_name: Option<&str>) -> SqlMetricFile {
    SqlMetricFile::new(path, sql, None, field_name.map(str::to_string)).expect("metric file")
}

/// Catalog with orchestrated metrics and run-metric helpers.
pub fn trace_catalog() -> MetricCatalog {
    MetricCatalog::new(vec![
        metric("slice_stats.sql", SLICE_STATS_SQL, Some("slice_stats")),
        metric("other.sql", OTHER_SQL, Some("other")),
        metric("empty.sql", EMPTY_SQL, Some("empty")),
        metric("twice.sql", TWICE_SQL, Some("twice")),
        metric("helpers/make_table.sql", MAKE_TABLE_SQL, None),
        metric("helpers/nested.sql", NESTED_SQL, None),
        metric("helpers/broken.sql", BROKEN_SQL, None),
        metric("helpers/loop.sql", LOOP_SQL, None),
    ])
    .expect("trace catalog")
}

/// Orchestrator over the trace schema and catalog.
pub fn trace_orchestrator() -> MetricOrchestrator {
    MetricOrchestrator::new(
        Arc::new(trace_registry()),
        Arc::new(trace_catalog()),
        "trace.TraceMetrics",
    )
    .expect("orchestrator")
}

/// In-memory engine seeded with two slices.
pub fn seeded_engine(orchestrator: MetricOrchestrator) -> SqliteEngine {
    let engine = SqliteEngine::in_memory(orchestrator).expect("engine");
    engine
        .connection()
        .execute_batch(
            "CREATE TABLE slice(name TEXT, dur INTEGER);
             INSERT INTO slice VALUES ('b', 20), ('a', 10);",
        )
        .expect("seed");
    engine
}

// ============================================================================
// SECTION: Conforming Decoders
// ============================================================================

/// Decoder for `trace.Slice`.
#[derive(Clone, PartialEq, prost::Message)]
pub struct Slice {
    #[prost(string, optional, tag = "1")]
    pub name: Option<String>,
    #[prost(int64, optional, tag = "2")]
    pub dur: Option<i64>,
}

/// Decoder for `trace.SliceStats`.
#[derive(Clone, PartialEq, prost::Message)]
pub struct SliceStats {
    #[prost(int64, optional, tag = "1")]
    pub count: Option<i64>,
    #[prost(message, repeated, tag = "2")]
    pub slices: Vec<Slice>,
    #[prost(int64, repeated, packed = "false", tag = "3")]
    pub durations: Vec<i64>,
}

/// Decoder for `trace.TraceMetrics`.
#[derive(Clone, PartialEq, prost::Message)]
pub struct TraceMetrics {
    #[prost(message, optional, tag = "1")]
    pub slice_stats: Option<SliceStats>,
    #[prost(message, optional, tag = "2")]
    pub other: Option<Slice>,
    #[prost(message, optional, tag = "3")]
    pub empty: Option<Slice>,
    #[prost(message, optional, tag = "4")]
    pub twice: Option<Slice>,
}

// ============================================================================
// SECTION: Audit
// ============================================================================

/// Audit sink recording event names.
#[derive(Default)]
pub struct RecordingSink {
    pub events: Mutex<Vec<MetricsAuditEvent>>,
}

impl RecordingSink {
    pub fn names(&self) -> Vec<&'static str> {
        self.events.lock().expect("events").iter().map(|event| event.event).collect()
    }
}

impl MetricsAuditSink for RecordingSink {
    fn record(&self, event: &MetricsAuditEvent) {
        self.events.lock().expect("events").push(event.clone());
    }
}
