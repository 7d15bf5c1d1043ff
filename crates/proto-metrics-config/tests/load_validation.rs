// crates/proto-metrics-config/tests/load_validation.rs
// =============================================================================
// Module: Config Load Validation Tests
// Description: File loading limits, section validation, and runtime assembly.
// Purpose: Ensure configuration fails closed and assembles a working engine.
// =============================================================================

//! Config load and validation tests for proto-metrics-config.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    reason = "Test-only assertions and helpers are permitted."
)]

mod common;

use std::fs;
use std::path::Path;

use common::MINIMAL_CONFIG;
use common::write_config;
use prost::Message;
use prost_types::DescriptorProto;
use prost_types::FieldDescriptorProto;
use prost_types::FileDescriptorProto;
use prost_types::FileDescriptorSet;
use prost_types::field_descriptor_proto::Label;
use prost_types::field_descriptor_proto::Type;
use proto_metrics_config::AuditSinkKind;
use proto_metrics_config::ConfigError;
use proto_metrics_config::MAX_CONFIG_FILE_SIZE;
use proto_metrics_config::ProtoMetricsConfig;
use proto_metrics_sqlite::SqliteJournalMode;

type TestResult = Result<(), String>;

fn assert_invalid<T>(result: Result<T, ConfigError>, needle: &str) -> TestResult {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error {message} did not contain {needle}"))
            }
        }
        Ok(_) => Err("expected invalid config".to_string()),
    }
}

fn parse(content: &str) -> Result<ProtoMetricsConfig, ConfigError> {
    ProtoMetricsConfig::from_toml(content, Path::new("."))
}

/// Decoder for `demo.Metrics`.
#[derive(Clone, PartialEq, prost::Message)]
struct Metrics {
    #[prost(message, optional, tag = "1")]
    rows: Option<Total>,
}

/// Decoder for `demo.Total`.
#[derive(Clone, PartialEq, prost::Message)]
struct Total {
    #[prost(int64, optional, tag = "1")]
    value: Option<i64>,
}

// ============================================================================
// SECTION: Loading
// ============================================================================

#[test]
fn minimal_config_loads_with_defaults() -> TestResult {
    let (_dir, path) = write_config(MINIMAL_CONFIG);
    let config = ProtoMetricsConfig::load(Some(&path)).map_err(|err| err.to_string())?;
    assert_eq!(config.root_message, "demo.Metrics");
    assert_eq!(config.engine.path, None);
    assert_eq!(config.engine.busy_timeout_ms, 5_000);
    assert_eq!(config.engine.journal_mode, SqliteJournalMode::Wal);
    assert_eq!(config.audit.sink, AuditSinkKind::None);
    assert_eq!(config.base_dir, path.parent().unwrap().to_path_buf());
    Ok(())
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::TempDir::new().expect("tempdir");
    let result = ProtoMetricsConfig::load(Some(&dir.path().join("absent.toml")));
    assert!(matches!(result, Err(ConfigError::Io(_))));
}

#[test]
fn oversized_config_is_rejected() -> TestResult {
    let padding = "#".repeat(MAX_CONFIG_FILE_SIZE);
    let (_dir, path) = write_config(&format!("{MINIMAL_CONFIG}\n{padding}\n"));
    assert_invalid(ProtoMetricsConfig::load(Some(&path)), "exceeds size limit")
}

#[test]
fn non_utf8_config_is_rejected() -> TestResult {
    let (_dir, path) = write_config("");
    fs::write(&path, [0xff, 0xfe, 0x00]).expect("write");
    assert_invalid(ProtoMetricsConfig::load(Some(&path)), "must be utf-8")
}

#[test]
fn unknown_keys_fail_to_parse() {
    let result = parse(&format!("{MINIMAL_CONFIG}\n[extra]\nkey = 1\n"));
    assert!(matches!(result, Err(ConfigError::Parse(_))));

    let result = parse(&MINIMAL_CONFIG.replace("field_name = \"rows\"", "field = \"rows\""));
    assert!(matches!(result, Err(ConfigError::Parse(_))));
}

// ============================================================================
// SECTION: Validation
// ============================================================================

#[test]
fn root_message_must_exist() -> TestResult {
    let content = MINIMAL_CONFIG.replace("root_message = \"demo.Metrics\"", "root_message = \"demo.Nope\"");
    assert_invalid(parse(&content), "Unable to find message type demo.Nope")
}

#[test]
fn field_names_must_be_singular_message_fields() -> TestResult {
    let content = MINIMAL_CONFIG.replace("field_name = \"rows\"", "field_name = \"missing\"");
    assert_invalid(parse(&content), "is not a field of demo.Metrics")?;
    let content = MINIMAL_CONFIG.replace("field_name = \"rows\"", "field_name = \"tags\"");
    assert_invalid(parse(&content), "must be a singular message field")
}

#[test]
fn metrics_need_exactly_one_sql_source() -> TestResult {
    let both = format!("{MINIMAL_CONFIG}sql_file = \"rows.sql\"\n");
    assert_invalid(parse(&both), "exactly one of sql and sql_file")?;
    let neither = format!("{MINIMAL_CONFIG}\n[[metrics]]\npath = \"helper.sql\"\n");
    assert_invalid(parse(&neither), "exactly one of sql and sql_file")
}

#[test]
fn duplicate_metric_paths_are_rejected() -> TestResult {
    let content = format!("{MINIMAL_CONFIG}\n[[metrics]]\npath = \"rows.sql\"\nsql = \"SELECT 1\"\n");
    assert_invalid(parse(&content), "Metric path rows.sql is registered twice")
}

#[test]
fn invalid_output_tables_are_rejected() -> TestResult {
    let content = MINIMAL_CONFIG.replace("field_name = \"rows\"", "field_name = \"rows\"\noutput_table = \"bad table\"");
    assert_invalid(parse(&content), "is not a valid identifier")
}

#[test]
fn audit_file_sink_requires_path() -> TestResult {
    let content = format!("{MINIMAL_CONFIG}\n[audit]\nsink = \"file\"\n");
    assert_invalid(parse(&content), "audit.path is required")?;
    let content = format!("{MINIMAL_CONFIG}\n[audit]\nsink = \"stderr\"\npath = \"audit.log\"\n");
    assert_invalid(parse(&content), "only valid for the file sink")
}

#[test]
fn zero_busy_timeout_is_rejected() -> TestResult {
    let content = format!("{MINIMAL_CONFIG}\n[engine]\nbusy_timeout_ms = 0\n");
    assert_invalid(parse(&content), "busy_timeout_ms must be greater than zero")
}

// ============================================================================
// SECTION: Relative Files
// ============================================================================

#[test]
fn sql_files_resolve_against_config_directory() -> TestResult {
    let content = MINIMAL_CONFIG.replace(
        "sql = \"CREATE TABLE rows_output AS SELECT Total('value', 3) AS proto;\\n\"",
        "sql_file = \"scripts/rows.sql\"",
    );
    let (dir, path) = write_config(&content);
    assert_invalid(ProtoMetricsConfig::load(Some(&path)), "sql_file")?;

    fs::create_dir_all(dir.path().join("scripts")).expect("scripts dir");
    fs::write(
        dir.path().join("scripts/rows.sql"),
        "CREATE TABLE rows_output AS SELECT Total('value', 9) AS proto;\n",
    )
    .expect("script");
    let config = ProtoMetricsConfig::load(Some(&path)).map_err(|err| err.to_string())?;
    let catalog = config.build_catalog().map_err(|err| err.to_string())?;
    let file = catalog.find_by_field("rows").expect("rows metric");
    assert!(file.sql.contains("Total('value', 9)"));
    Ok(())
}

#[test]
fn descriptor_sets_extend_the_schema() -> TestResult {
    let set = FileDescriptorSet {
        file: vec![FileDescriptorProto {
            name: Some("extra.proto".to_string()),
            package: Some("extra".to_string()),
            message_type: vec![DescriptorProto {
                name: Some("Gauge".to_string()),
                field: vec![FieldDescriptorProto {
                    name: Some("level".to_string()),
                    number: Some(1),
                    label: Some(Label::Optional as i32),
                    r#type: Some(Type::Double as i32),
                    ..FieldDescriptorProto::default()
                }],
                ..DescriptorProto::default()
            }],
            ..FileDescriptorProto::default()
        }],
    };
    let content = MINIMAL_CONFIG.replace("descriptor_sets = []", "descriptor_sets = [\"extra.pb\"]");
    let (dir, path) = write_config(&content);
    fs::write(dir.path().join("extra.pb"), set.encode_to_vec()).expect("descriptor set");
    let config = ProtoMetricsConfig::load(Some(&path)).map_err(|err| err.to_string())?;
    let registry = config.build_registry().map_err(|err| err.to_string())?;
    assert!(registry.find_message("extra.Gauge").is_some());
    assert!(registry.find_message("demo.Total").is_some());
    Ok(())
}

// ============================================================================
// SECTION: Assembly
// ============================================================================

#[test]
fn configured_engine_computes_metrics() -> TestResult {
    let content = format!("{MINIMAL_CONFIG}\n[engine]\npath = \"db/metrics.db\"\njournal_mode = \"delete\"\n\n[audit]\nsink = \"file\"\npath = \"audit.log\"\n");
    let (dir, path) = write_config(&content);
    let config = ProtoMetricsConfig::load(Some(&path)).map_err(|err| err.to_string())?;
    assert_eq!(config.engine_config().path, Some(dir.path().join("db/metrics.db")));

    let mut engine = config.open_engine().map_err(|err| err.to_string())?;
    let bytes = engine.compute(&["rows"]).map_err(|err| err.to_string())?;
    let metrics = Metrics::decode(bytes.as_slice()).map_err(|err| err.to_string())?;
    assert_eq!(metrics.rows.and_then(|rows| rows.value), Some(3));
    assert!(dir.path().join("db/metrics.db").exists());

    let audit = fs::read_to_string(dir.path().join("audit.log")).expect("audit log");
    assert!(audit.lines().any(|line| line.contains("\"event\":\"compute_completed\"")));
    Ok(())
}
