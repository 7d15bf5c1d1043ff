// crates/proto-metrics-config/src/config.rs
// ============================================================================
// Module: Proto Metrics Configuration
// Description: Configuration loading, validation, and runtime assembly.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: proto-metrics-core, proto-metrics-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! It names the schema sources, the root message, the metric scripts, the
//! `SQLite` engine settings, and the audit sink. Relative paths resolve
//! against the directory holding the config file. Validation builds the full
//! schema and catalog, so a config that validates can always be assembled
//! into an engine.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use proto_metrics_core::EnumSpec;
use proto_metrics_core::FileAuditSink;
use proto_metrics_core::MessageSpec;
use proto_metrics_core::MetricCatalog;
use proto_metrics_core::MetricOrchestrator;
use proto_metrics_core::MetricsAuditSink;
use proto_metrics_core::MetricsError;
use proto_metrics_core::NoopAuditSink;
use proto_metrics_core::SchemaRegistry;
use proto_metrics_core::SqlMetricFile;
use proto_metrics_core::StderrAuditSink;
use proto_metrics_core::WireKind;
use proto_metrics_sqlite::SqliteEngine;
use proto_metrics_sqlite::SqliteEngineConfig;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
pub const DEFAULT_CONFIG_NAME: &str = "proto-metrics.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "PROTO_METRICS_CONFIG";
/// Maximum configuration file size in bytes.
pub const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum metric script size in bytes.
pub const MAX_SQL_FILE_SIZE: usize = 1024 * 1024;
/// Maximum descriptor set size in bytes.
pub const MAX_DESCRIPTOR_SET_SIZE: usize = 16 * 1024 * 1024;
/// Maximum number of metric entries.
pub const MAX_METRICS: usize = 4096;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;

// ============================================================================
// SECTION: Config Model
// ============================================================================

/// Proto metrics configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProtoMetricsConfig {
    /// Full name of the composite output message.
    pub root_message: String,
    /// `SQLite` engine configuration.
    #[serde(default)]
    pub engine: SqliteEngineConfig,
    /// Schema sources.
    #[serde(default)]
    pub schema: SchemaConfig,
    /// Metric and helper scripts.
    #[serde(default)]
    pub metrics: Vec<MetricConfig>,
    /// Audit sink configuration.
    #[serde(default)]
    pub audit: AuditConfig,
    /// Directory relative paths resolve against (not serialized).
    #[serde(skip)]
    pub base_dir: PathBuf,
}

/// Schema sources merged into one registry.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaConfig {
    /// Binary `FileDescriptorSet` files.
    #[serde(default)]
    pub descriptor_sets: Vec<PathBuf>,
    /// Inline message definitions.
    #[serde(default)]
    pub messages: Vec<MessageSpec>,
    /// Inline enum definitions.
    #[serde(default)]
    pub enums: Vec<EnumSpec>,
}

/// One metric or helper script.
///
/// # Invariants
/// - Exactly one of `sql` and `sql_file` is set.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricConfig {
    /// Script identifier used by `RUN_METRIC`.
    pub path: String,
    /// Inline SQL text.
    #[serde(default)]
    pub sql: Option<String>,
    /// SQL file, relative to the config directory.
    #[serde(default)]
    pub sql_file: Option<PathBuf>,
    /// Output table; defaults to `<field_name>_output`.
    #[serde(default)]
    pub output_table: Option<String>,
    /// Root message field receiving the output; helpers leave it unset.
    #[serde(default)]
    pub field_name: Option<String>,
}

/// Audit sink selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditSinkKind {
    /// Discard audit events.
    #[default]
    None,
    /// JSON lines to stderr.
    Stderr,
    /// Append-only JSON lines file.
    File,
}

/// Audit configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    /// Sink receiving audit events.
    #[serde(default)]
    pub sink: AuditSinkKind,
    /// Log file for the file sink.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

// ============================================================================
// SECTION: Loading
// ============================================================================

impl ProtoMetricsConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// The path comes from `path`, then [`CONFIG_ENV_VAR`], then
    /// [`DEFAULT_CONFIG_NAME`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let content = read_limited(&resolved, MAX_CONFIG_FILE_SIZE, "config file")?;
        let content = String::from_utf8(content)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        let base_dir = resolved.parent().map(Path::to_path_buf).unwrap_or_default();
        Self::from_toml(&content, &base_dir)
    }

    /// Parses and validates configuration text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml(content: &str, base_dir: &Path) -> Result<Self, ConfigError> {
        let mut config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.base_dir = base_dir.to_path_buf();
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// Builds the registry and catalog, so referenced files must exist.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.root_message.trim().is_empty() {
            return Err(ConfigError::Invalid("root_message must be non-empty".to_string()));
        }
        if self.metrics.len() > MAX_METRICS {
            return Err(ConfigError::Invalid(format!("metrics exceeds {MAX_METRICS} entries")));
        }
        if let Some(path) = &self.engine.path {
            validate_path_string("engine.path", &path.to_string_lossy())?;
        }
        if self.engine.busy_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "engine.busy_timeout_ms must be greater than zero".to_string(),
            ));
        }
        self.audit.validate()?;
        for metric in &self.metrics {
            metric.validate()?;
        }
        let registry = self.build_registry()?;
        let root = registry.message(&self.root_message)?;
        for metric in &self.metrics {
            let Some(field_name) = &metric.field_name else {
                continue;
            };
            let Some(field) = root.find_field(field_name) else {
                return Err(ConfigError::Invalid(format!(
                    "metric {} field_name {field_name} is not a field of {}",
                    metric.path, self.root_message
                )));
            };
            if field.kind != WireKind::Message || field.repeated {
                return Err(ConfigError::Invalid(format!(
                    "metric {} field_name {field_name} must be a singular message field",
                    metric.path
                )));
            }
        }
        self.build_catalog()?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Assembly
// ============================================================================

impl ProtoMetricsConfig {
    /// Builds the schema registry from descriptor sets and inline definitions.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a descriptor set cannot be read or the
    /// merged schema is inconsistent.
    pub fn build_registry(&self) -> Result<SchemaRegistry, ConfigError> {
        let mut builder = SchemaRegistry::builder();
        for path in &self.schema.descriptor_sets {
            validate_path_string("schema.descriptor_sets", &path.to_string_lossy())?;
            let bytes =
                read_limited(&self.resolve(path), MAX_DESCRIPTOR_SET_SIZE, "descriptor set")?;
            builder = builder.descriptor_set(&bytes)?;
        }
        let registry = builder
            .extend(self.schema.messages.iter().cloned(), self.schema.enums.iter().cloned())
            .build()?;
        Ok(registry)
    }

    /// Builds the metric catalog, reading script files as needed.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a script cannot be read or the catalog
    /// holds duplicates.
    pub fn build_catalog(&self) -> Result<MetricCatalog, ConfigError> {
        let mut files = Vec::with_capacity(self.metrics.len());
        for metric in &self.metrics {
            let sql = match (&metric.sql, &metric.sql_file) {
                (Some(sql), None) => sql.clone(),
                (None, Some(path)) => {
                    let bytes = read_limited(&self.resolve(path), MAX_SQL_FILE_SIZE, "sql_file")?;
                    String::from_utf8(bytes).map_err(|_| {
                        ConfigError::Invalid(format!("sql_file of metric {} must be utf-8", metric.path))
                    })?
                }
                _ => {
                    return Err(ConfigError::Invalid(format!(
                        "metric {} must set exactly one of sql and sql_file",
                        metric.path
                    )));
                }
            };
            files.push(SqlMetricFile::new(
                metric.path.clone(),
                sql,
                metric.output_table.clone(),
                metric.field_name.clone(),
            )?);
        }
        Ok(MetricCatalog::new(files)?)
    }

    /// Builds the configured audit sink.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the audit file cannot be opened.
    pub fn build_audit_sink(&self) -> Result<Arc<dyn MetricsAuditSink>, ConfigError> {
        match (self.audit.sink, &self.audit.path) {
            (AuditSinkKind::None, _) => Ok(Arc::new(NoopAuditSink)),
            (AuditSinkKind::Stderr, _) => Ok(Arc::new(StderrAuditSink)),
            (AuditSinkKind::File, Some(path)) => {
                let sink = FileAuditSink::new(&self.resolve(path))
                    .map_err(|err| ConfigError::Io(err.to_string()))?;
                Ok(Arc::new(sink))
            }
            (AuditSinkKind::File, None) => {
                Err(ConfigError::Invalid("audit.path is required for the file sink".to_string()))
            }
        }
    }

    /// Builds an orchestrator with the configured schema, catalog, and audit sink.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when any component fails to build.
    pub fn build_orchestrator(&self) -> Result<MetricOrchestrator, ConfigError> {
        let registry = Arc::new(self.build_registry()?);
        let catalog = Arc::new(self.build_catalog()?);
        let orchestrator = MetricOrchestrator::new(registry, catalog, self.root_message.clone())?;
        Ok(orchestrator.with_audit(self.build_audit_sink()?))
    }

    /// Returns the engine config with the database path resolved.
    #[must_use]
    pub fn engine_config(&self) -> SqliteEngineConfig {
        let mut engine = self.engine.clone();
        engine.path = engine.path.as_deref().map(|path| self.resolve(path));
        engine
    }

    /// Opens a `SQLite` engine wired to the configured orchestrator.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the orchestrator or engine fails to build.
    pub fn open_engine(&self) -> Result<SqliteEngine, ConfigError> {
        let orchestrator = self.build_orchestrator()?;
        SqliteEngine::open(&self.engine_config(), orchestrator)
            .map_err(|err| ConfigError::Invalid(err.to_string()))
    }

    /// Resolves `path` against the config directory.
    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() { path.to_path_buf() } else { self.base_dir.join(path) }
    }
}

// ============================================================================
// SECTION: Section Validation
// ============================================================================

impl MetricConfig {
    /// Validates the metric entry shape.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.path.trim().is_empty() {
            return Err(ConfigError::Invalid("metrics.path must be non-empty".to_string()));
        }
        if self.sql.is_some() == self.sql_file.is_some() {
            return Err(ConfigError::Invalid(format!(
                "metric {} must set exactly one of sql and sql_file",
                self.path
            )));
        }
        if let Some(path) = &self.sql_file {
            validate_path_string("metrics.sql_file", &path.to_string_lossy())?;
        }
        if self.field_name.as_deref().is_some_and(|name| name.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "metric {} field_name must be non-empty",
                self.path
            )));
        }
        Ok(())
    }
}

impl AuditConfig {
    /// Validates that only the file sink names a path.
    fn validate(&self) -> Result<(), ConfigError> {
        match (self.sink, &self.path) {
            (AuditSinkKind::File, None) => {
                Err(ConfigError::Invalid("audit.path is required for the file sink".to_string()))
            }
            (AuditSinkKind::File, Some(path)) => validate_path_string("audit.path", &path.to_string_lossy()),
            (_, Some(_)) => {
                Err(ConfigError::Invalid("audit.path is only valid for the file sink".to_string()))
            }
            (_, None) => Ok(()),
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration or referenced files.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl From<MetricsError> for ConfigError {
    fn from(error: MetricsError) -> Self {
        Self::Invalid(error.to_string())
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        if component.as_os_str().to_string_lossy().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Reads a file, failing closed when it exceeds `limit` bytes.
fn read_limited(path: &Path, limit: usize, label: &str) -> Result<Vec<u8>, ConfigError> {
    let metadata = fs::metadata(path)
        .map_err(|err| ConfigError::Io(format!("{label} {}: {err}", path.display())))?;
    if !usize::try_from(metadata.len()).is_ok_and(|len| len <= limit) {
        return Err(ConfigError::Invalid(format!("{label} {} exceeds size limit", path.display())));
    }
    let bytes =
        fs::read(path).map_err(|err| ConfigError::Io(format!("{label} {}: {err}", path.display())))?;
    if bytes.len() > limit {
        return Err(ConfigError::Invalid(format!("{label} {} exceeds size limit", path.display())));
    }
    Ok(bytes)
}

// ============================================================================
// SECTION: Tests
// ============================================================================
