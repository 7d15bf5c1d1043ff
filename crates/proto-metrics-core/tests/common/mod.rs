// crates/proto-metrics-core/tests/common/mod.rs
// =============================================================================
// Module: Core Test Helpers
// Description: Shared schema fixtures, decoders, and a scripted SQL engine.
// Purpose: Reduce duplication across integration tests for proto-metrics-core.
// =============================================================================

#![allow(
    dead_code,
    missing_docs,
    clippy::missing_docs_in_private_items,
    reason = "Test helpers are selectively used across suites."
)]

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::Mutex;

use proto_metrics_core::EngineError;
use proto_metrics_core::EnumSpec;
use proto_metrics_core::FieldDescriptor;
use proto_metrics_core::MessageSpec;
use proto_metrics_core::MetricsAuditEvent;
use proto_metrics_core::MetricsAuditSink;
use proto_metrics_core::OwnedSqlValue;
use proto_metrics_core::QueryOutput;
use proto_metrics_core::SchemaRegistry;
use proto_metrics_core::SqlEngine;
use proto_metrics_core::WireKind;

// ============================================================================
// SECTION: Schema Fixtures
// ============================================================================

/// Builds a scalar or reference field definition.
pub fn field(name: &str, number: u32, kind: WireKind) -> FieldDescriptor {
    FieldDescriptor {
        name: name.to_string(),
        number,
        kind,
        repeated: false,
        type_name: None,
    }
}

/// Builds a field referencing a named enum or message type.
pub fn typed_field(name: &str, number: u32, kind: WireKind, type_name: &str) -> FieldDescriptor {
    FieldDescriptor {
        type_name: Some(type_name.to_string()),
        ..field(name, number, kind)
    }
}

/// Marks a field definition as repeated.
pub fn repeated(mut field: FieldDescriptor) -> FieldDescriptor {
    field.repeated = true;
    field
}

/// Registry covering every writable wire kind plus nested and repeated fields.
pub fn sample_registry() -> SchemaRegistry {
    let inner = MessageSpec {
        name: "test.Inner".to_string(),
        fields: vec![field("count", 1, WireKind::Int64), field("label", 2, WireKind::String)],
    };
    let sample = MessageSpec {
        name: "test.Sample".to_string(),
        fields: vec![
            field("i32_field", 1, WireKind::Int32),
            field("i64_field", 2, WireKind::Int64),
            field("u32_field", 3, WireKind::Uint32),
            field("u64_field", 4, WireKind::Uint64),
            field("s32_field", 5, WireKind::Sint32),
            field("s64_field", 6, WireKind::Sint64),
            field("fixed32_field", 7, WireKind::Fixed32),
            field("sfixed32_field", 8, WireKind::Sfixed32),
            field("fixed64_field", 9, WireKind::Fixed64),
            field("sfixed64_field", 10, WireKind::Sfixed64),
            field("float_field", 11, WireKind::Float),
            field("double_field", 12, WireKind::Double),
            field("bool_field", 13, WireKind::Bool),
            field("string_field", 14, WireKind::String),
            typed_field("color", 15, WireKind::Enum, "test.Color"),
            typed_field("inner", 16, WireKind::Message, "test.Inner"),
            repeated(field("numbers", 17, WireKind::Int64)),
            repeated(typed_field("inners", 18, WireKind::Message, "test.Inner")),
            repeated(field("names", 19, WireKind::String)),
            field("raw", 20, WireKind::Bytes),
        ],
    };
    let root = MessageSpec {
        name: "test.Root".to_string(),
        fields: vec![
            typed_field("alpha", 1, WireKind::Message, "test.Inner"),
            typed_field("beta", 2, WireKind::Message, "test.Inner"),
        ],
    };
    let color = EnumSpec {
        name: "test.Color".to_string(),
        values: BTreeMap::from([
            ("UNKNOWN".to_string(), 0),
            ("RED".to_string(), 1),
            ("GREEN".to_string(), 2),
        ]),
    };
    SchemaRegistry::builder()
        .message(inner)
        .message(sample)
        .message(root)
        .enumeration(color)
        .build()
        .expect("sample registry")
}

// ============================================================================
// SECTION: Conforming Decoders
// ============================================================================

/// Decoder for `test.Inner`.
#[derive(Clone, PartialEq, prost::Message)]
pub struct Inner {
    #[prost(int64, optional, tag = "1")]
    pub count: Option<i64>,
    #[prost(string, optional, tag = "2")]
    pub label: Option<String>,
}

/// Decoder for `test.Sample`.
#[derive(Clone, PartialEq, prost::Message)]
pub struct Sample {
    #[prost(int32, optional, tag = "1")]
    pub i32_field: Option<i32>,
    #[prost(int64, optional, tag = "2")]
    pub i64_field: Option<i64>,
    #[prost(uint32, optional, tag = "3")]
    pub u32_field: Option<u32>,
    #[prost(uint64, optional, tag = "4")]
    pub u64_field: Option<u64>,
    #[prost(sint32, optional, tag = "5")]
    pub s32_field: Option<i32>,
    #[prost(sint64, optional, tag = "6")]
    pub s64_field: Option<i64>,
    #[prost(fixed32, optional, tag = "7")]
    pub fixed32_field: Option<u32>,
    #[prost(sfixed32, optional, tag = "8")]
    pub sfixed32_field: Option<i32>,
    #[prost(fixed64, optional, tag = "9")]
    pub fixed64_field: Option<u64>,
    #[prost(sfixed64, optional, tag = "10")]
    pub sfixed64_field: Option<i64>,
    #[prost(float, optional, tag = "11")]
    pub float_field: Option<f32>,
    #[prost(double, optional, tag = "12")]
    pub double_field: Option<f64>,
    #[prost(bool, optional, tag = "13")]
    pub bool_field: Option<bool>,
    #[prost(string, optional, tag = "14")]
    pub string_field: Option<String>,
    #[prost(int32, optional, tag = "15")]
    pub color: Option<i32>,
    #[prost(message, optional, tag = "16")]
    pub inner: Option<Inner>,
    #[prost(int64, repeated, packed = "false", tag = "17")]
    pub numbers: Vec<i64>,
    #[prost(message, repeated, tag = "18")]
    pub inners: Vec<Inner>,
    #[prost(string, repeated, tag = "19")]
    pub names: Vec<String>,
    #[prost(bytes = "vec", optional, tag = "20")]
    pub raw: Option<Vec<u8>>,
}

/// Decoder for `test.Root`.
#[derive(Clone, PartialEq, prost::Message)]
pub struct Root {
    #[prost(message, optional, tag = "1")]
    pub alpha: Option<Inner>,
    #[prost(message, optional, tag = "2")]
    pub beta: Option<Inner>,
}

/// Independent mirror of the envelope record layout.
#[derive(Clone, PartialEq, prost::Message)]
pub struct EnvelopeRecord {
    #[prost(bool, optional, tag = "1")]
    pub is_repeated: Option<bool>,
    #[prost(message, optional, tag = "2")]
    pub single: Option<SingleRecord>,
    #[prost(message, optional, tag = "3")]
    pub repeated: Option<RepeatedRecord>,
}

/// Mirror of the single record.
#[derive(Clone, PartialEq, prost::Message)]
pub struct SingleRecord {
    #[prost(uint32, optional, tag = "1")]
    pub r#type: Option<u32>,
    #[prost(string, optional, tag = "2")]
    pub type_name: Option<String>,
    #[prost(bytes = "vec", optional, tag = "3")]
    pub protobuf: Option<Vec<u8>>,
}

/// Mirror of the repeated record.
#[derive(Clone, PartialEq, prost::Message)]
pub struct RepeatedRecord {
    #[prost(message, repeated, tag = "1")]
    pub value: Vec<ElementRecord>,
}

/// Mirror of one repeated element.
#[derive(Clone, PartialEq, prost::Message)]
pub struct ElementRecord {
    #[prost(int64, optional, tag = "1")]
    pub int_value: Option<i64>,
    #[prost(string, optional, tag = "2")]
    pub string_value: Option<String>,
    #[prost(double, optional, tag = "3")]
    pub double_value: Option<f64>,
    #[prost(bytes = "vec", optional, tag = "4")]
    pub bytes_value: Option<Vec<u8>>,
}

/// Encodes a single envelope record by hand.
pub fn single_record(declared_type: u32, type_name: &str, payload: Option<Vec<u8>>) -> Vec<u8> {
    prost::Message::encode_to_vec(&EnvelopeRecord {
        is_repeated: Some(false),
        single: Some(SingleRecord {
            r#type: Some(declared_type),
            type_name: Some(type_name.to_string()),
            protobuf: payload,
        }),
        repeated: None,
    })
}

// ============================================================================
// SECTION: Scripted Engine
// ============================================================================

/// SQL engine double that records statements and serves canned query results.
#[derive(Debug, Default)]
pub struct FakeEngine {
    /// Statements executed, in order.
    pub executed: Vec<String>,
    /// Canned results keyed by exact query text.
    pub outputs: HashMap<String, QueryOutput>,
    /// Statements containing this text fail.
    pub fail_on: Option<String>,
}

impl FakeEngine {
    /// Serves `rows` of single blob values for `table`.
    pub fn with_blob_rows(mut self, table: &str, rows: Vec<Vec<u8>>) -> Self {
        let output = QueryOutput {
            column_count: 1,
            rows: rows.into_iter().map(|row| vec![OwnedSqlValue::Bytes(row)]).collect(),
        };
        self.outputs.insert(format!("SELECT * FROM {table};"), output);
        self
    }

    /// Serves an arbitrary result for `table`.
    pub fn with_output(mut self, table: &str, output: QueryOutput) -> Self {
        self.outputs.insert(format!("SELECT * FROM {table};"), output);
        self
    }
}

impl SqlEngine for FakeEngine {
    fn execute(&mut self, statement: &str) -> Result<(), EngineError> {
        if let Some(needle) = &self.fail_on
            && statement.contains(needle.as_str())
        {
            return Err(EngineError::Sql(format!("near \"{needle}\": syntax error")));
        }
        self.executed.push(statement.to_string());
        Ok(())
    }

    fn query(&mut self, sql: &str, max_rows: usize) -> Result<QueryOutput, EngineError> {
        let Some(output) = self.outputs.get(sql) else {
            return Err(EngineError::Sql(format!("no such table for query: {sql}")));
        };
        let mut output = output.clone();
        output.rows.truncate(max_rows);
        Ok(output)
    }
}

// ============================================================================
// SECTION: Audit Capture
// ============================================================================

/// Audit sink capturing events in memory.
#[derive(Default)]
pub struct RecordingSink {
    pub events: Mutex<Vec<MetricsAuditEvent>>,
}

impl RecordingSink {
    /// Returns the recorded event names in order.
    pub fn names(&self) -> Vec<&'static str> {
        self.events.lock().expect("audit lock").iter().map(|event| event.event).collect()
    }
}

impl MetricsAuditSink for RecordingSink {
    fn record(&self, event: &MetricsAuditEvent) {
        self.events.lock().expect("audit lock").push(event.clone());
    }
}
