// crates/proto-metrics-config/tests/common/mod.rs
// =============================================================================
// Module: Config Test Helpers
// Description: Shared helpers for config validation tests.
// Purpose: Reduce duplication across integration tests for proto-metrics-config.
// =============================================================================

#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]

use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;

/// Minimal valid configuration with an inline schema and one metric.
pub const MINIMAL_CONFIG: &str = r#"
root_message = "demo.Metrics"

[schema]
descriptor_sets = []

[[schema.messages]]
name = "demo.Total"
fields = [{ name = "value", number = 1, kind = "int64" }]

[[schema.messages]]
name = "demo.Metrics"
fields = [
    { name = "rows", number = 1, kind = "message", type_name = "demo.Total" },
    { name = "tags", number = 2, kind = "string", repeated = true },
]

[[metrics]]
path = "rows.sql"
field_name = "rows"
sql = "CREATE TABLE rows_output AS SELECT Total('value', 3) AS proto;\n"
"#;

/// Writes `content` as `proto-metrics.toml` in a fresh directory.
pub fn write_config(content: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("proto-metrics.toml");
    fs::write(&path, content).expect("write config");
    (dir, path)
}
