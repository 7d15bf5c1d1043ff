// crates/proto-metrics-sqlite/src/engine.rs
// ============================================================================
// Module: SQLite Metric Engine
// Description: SqlEngine implementation over an embedded SQLite connection.
// Purpose: Run metric scripts with the proto encoder registered as SQL functions.
// Dependencies: proto-metrics-core, rusqlite, serde, thiserror
// ============================================================================

//! ## Overview
//! [`SqliteEngine`] owns one connection with the metric functions registered
//! and implements [`SqlEngine`] for the orchestrator. Each executed text may
//! hold several statements; every statement is stepped once. Run-metric calls
//! queued by a statement are executed, depth-first and in call order, as soon
//! as that statement finishes.
//! Security posture: metric scripts and database contents are trusted inputs
//! to this engine; paths are validated before opening.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use proto_metrics_core::EngineError;
use proto_metrics_core::MetricOrchestrator;
use proto_metrics_core::MetricsAuditSink;
use proto_metrics_core::MetricsError;
use proto_metrics_core::MetricsResult;
use proto_metrics_core::QueryOutput;
use proto_metrics_core::SqlEngine;
use proto_metrics_core::SqlValue;
use proto_metrics_core::runtime::run_prepared;
use rusqlite::Batch;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::Statement;
use rusqlite::fallible_iterator::FallibleIterator;
use serde::Deserialize;
use thiserror::Error;

use crate::functions::PendingRuns;
use crate::functions::clear_pending;
use crate::functions::register_functions;
use crate::functions::take_pending;
use crate::functions::value_from_ref;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum nesting of run-metric calls inside run-metric scripts.
pub const MAX_RUN_METRIC_DEPTH: usize = 32;

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteJournalMode {
    /// WAL journal mode.
    #[default]
    Wal,
    /// Delete journal mode.
    Delete,
}

impl SqliteJournalMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode.
    #[default]
    Full,
    /// Normal synchronous mode.
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` metric engine.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SqliteEngineConfig {
    /// Database file path; `None` opens a private in-memory database.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode; ignored for in-memory databases.
    #[serde(default)]
    pub journal_mode: SqliteJournalMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl Default for SqliteEngineConfig {
    fn default() -> Self {
        Self {
            path: None,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteJournalMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` engine setup errors.
#[derive(Debug, Error)]
pub enum SqliteEngineError {
    /// Filesystem error while preparing the database path.
    #[error("sqlite engine io error: {0}")]
    Io(String),
    /// `SQLite` rejected an open, pragma, or function registration.
    #[error("sqlite engine db error: {0}")]
    Db(String),
    /// Invalid engine configuration.
    #[error("sqlite engine invalid config: {0}")]
    Invalid(String),
}

impl From<SqliteEngineError> for MetricsError {
    fn from(error: SqliteEngineError) -> Self {
        Self::Engine(error.to_string())
    }
}

// ============================================================================
// SECTION: Engine
// ============================================================================

/// Metric engine backed by one `SQLite` connection.
///
/// # Invariants
/// - Metric functions are registered before the engine is returned.
/// - The pending run queue is empty whenever no statement is executing.
pub struct SqliteEngine {
    /// Connection with the metric functions registered.
    connection: Connection,
    /// Orchestrator whose schema and catalog back the functions.
    orchestrator: MetricOrchestrator,
    /// Run-metric calls queued by the statement in flight.
    pending: PendingRuns,
    /// Registered build-proto function names.
    build_proto_functions: Vec<String>,
}

impl SqliteEngine {
    /// Opens an engine and registers the metric functions.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteEngineError`] when the path is invalid, the database
    /// cannot be opened, or a function cannot be registered.
    pub fn open(
        config: &SqliteEngineConfig,
        orchestrator: MetricOrchestrator,
    ) -> Result<Self, SqliteEngineError> {
        let connection = open_connection(config)?;
        let pending = PendingRuns::default();
        let build_proto_functions = register_functions(
            &connection,
            orchestrator.registry(),
            orchestrator.catalog(),
            &pending,
        )
        .map_err(|err| SqliteEngineError::Db(err.to_string()))?;
        Ok(Self {
            connection,
            orchestrator,
            pending,
            build_proto_functions,
        })
    }

    /// Opens an engine over a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteEngineError`] when function registration fails.
    pub fn in_memory(orchestrator: MetricOrchestrator) -> Result<Self, SqliteEngineError> {
        Self::open(&SqliteEngineConfig::default(), orchestrator)
    }

    /// Returns the underlying connection.
    #[must_use]
    pub const fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Returns the orchestrator backing the engine.
    #[must_use]
    pub const fn orchestrator(&self) -> &MetricOrchestrator {
        &self.orchestrator
    }

    /// Returns the registered build-proto function names.
    #[must_use]
    pub fn build_proto_functions(&self) -> &[String] {
        &self.build_proto_functions
    }

    /// Computes `metric_names` into a serialized root message.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError`] for the first failing metric.
    pub fn compute<S: AsRef<str>>(&mut self, metric_names: &[S]) -> MetricsResult<Vec<u8>> {
        let orchestrator = self.orchestrator.clone();
        orchestrator.compute(self, metric_names)
    }

    /// Runs a helper script directly, using run-metric arguments.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError`] when arguments are invalid or a statement fails.
    pub fn run_metric(&mut self, args: &[SqlValue<'_>]) -> MetricsResult<()> {
        let orchestrator = self.orchestrator.clone();
        orchestrator.run_metric(self, args)
    }

    /// Borrows the connection as a statement runner.
    fn runner(&self) -> ConnectionRunner<'_> {
        ConnectionRunner {
            connection: &self.connection,
            pending: &self.pending,
            audit: self.orchestrator.audit().as_ref(),
            depth: 0,
        }
    }
}

impl SqlEngine for SqliteEngine {
    fn execute(&mut self, statement: &str) -> Result<(), EngineError> {
        self.runner().execute(statement)
    }

    fn query(&mut self, sql: &str, max_rows: usize) -> Result<QueryOutput, EngineError> {
        self.runner().query(sql, max_rows)
    }
}

// ============================================================================
// SECTION: Statement Runner
// ============================================================================

/// Executes statements against a borrowed connection.
///
/// Run-metric scripts re-enter the runner, so it only holds shared borrows.
struct ConnectionRunner<'a> {
    /// Connection statements run on.
    connection: &'a Connection,
    /// Queue filled by the run-metric function.
    pending: &'a PendingRuns,
    /// Sink receiving run-metric events.
    audit: &'a dyn MetricsAuditSink,
    /// Current run-metric nesting depth.
    depth: usize,
}

impl ConnectionRunner<'_> {
    /// Executes every run-metric call queued by the statement just stepped.
    fn drain_pending(&mut self) -> Result<(), EngineError> {
        let runs = take_pending(self.pending).map_err(EngineError::Metrics)?;
        if runs.is_empty() {
            return Ok(());
        }
        if self.depth >= MAX_RUN_METRIC_DEPTH {
            return Err(EngineError::Metrics(MetricsError::Engine(format!(
                "RUN_METRIC: nesting exceeds {MAX_RUN_METRIC_DEPTH} levels"
            ))));
        }
        self.depth += 1;
        let audit = self.audit;
        let result = runs.iter().try_for_each(|run| run_prepared(&mut *self, run, audit));
        self.depth -= 1;
        result.map_err(EngineError::Metrics)
    }

    /// Maps a `SQLite` failure and discards work queued by the failed statement.
    fn sql_error(&self, error: &rusqlite::Error) -> EngineError {
        clear_pending(self.pending);
        EngineError::Sql(error.to_string())
    }
}

impl SqlEngine for ConnectionRunner<'_> {
    fn execute(&mut self, statement: &str) -> Result<(), EngineError> {
        let mut batch = Batch::new(self.connection, statement);
        loop {
            let next = batch.next().map_err(|err| self.sql_error(&err))?;
            let Some(mut prepared) = next else {
                return Ok(());
            };
            step_once(&mut prepared).map_err(|err| self.sql_error(&err))?;
            drop(prepared);
            self.drain_pending().inspect_err(|_| clear_pending(self.pending))?;
        }
    }

    fn query(&mut self, sql: &str, max_rows: usize) -> Result<QueryOutput, EngineError> {
        let output =
            collect_rows(self.connection, sql, max_rows).map_err(|err| self.sql_error(&err))?;
        self.drain_pending().inspect_err(|_| clear_pending(self.pending))?;
        Ok(output)
    }
}

/// Steps a prepared statement to its first row.
fn step_once(statement: &mut Statement<'_>) -> rusqlite::Result<()> {
    let mut rows = statement.query([])?;
    rows.next()?;
    Ok(())
}

/// Runs `sql` and copies at most `max_rows` rows into owned values.
fn collect_rows(connection: &Connection, sql: &str, max_rows: usize) -> rusqlite::Result<QueryOutput> {
    let mut statement = connection.prepare(sql)?;
    let column_count = statement.column_count();
    let mut rows = statement.query([])?;
    let mut collected = Vec::new();
    while collected.len() < max_rows {
        let Some(row) = rows.next()? else {
            break;
        };
        let mut values = Vec::with_capacity(column_count);
        for index in 0 .. column_count {
            values.push(value_from_ref(row.get_ref(index)?)?.to_owned_value());
        }
        collected.push(values);
    }
    Ok(QueryOutput {
        column_count,
        rows: collected,
    })
}

// ============================================================================
// SECTION: Connection Setup
// ============================================================================

/// Opens the configured database with metric-friendly defaults.
fn open_connection(config: &SqliteEngineConfig) -> Result<Connection, SqliteEngineError> {
    let connection = match &config.path {
        Some(path) => {
            validate_engine_path(path)?;
            ensure_parent_dir(path)?;
            let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
            Connection::open_with_flags(path, flags)
                .map_err(|err| SqliteEngineError::Db(err.to_string()))?
        }
        None => Connection::open_in_memory().map_err(|err| SqliteEngineError::Db(err.to_string()))?,
    };
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

/// Applies journal, sync, and busy-timeout settings.
fn apply_pragmas(connection: &Connection, config: &SqliteEngineConfig) -> Result<(), SqliteEngineError> {
    if config.path.is_some() {
        connection
            .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
            .map_err(|err| SqliteEngineError::Db(err.to_string()))?;
    }
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(|err| SqliteEngineError::Db(err.to_string()))?;
    connection
        .busy_timeout(Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| SqliteEngineError::Db(err.to_string()))?;
    Ok(())
}

/// Ensures the parent directory of a database path exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteEngineError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteEngineError::Io("database path missing parent directory".to_string()));
    };
    std::fs::create_dir_all(parent).map_err(|err| SqliteEngineError::Io(err.to_string()))
}

/// Validates database paths for safety limits.
///
/// # Errors
///
/// Returns [`SqliteEngineError::Invalid`] when the path is overlong or names a
/// directory.
pub fn validate_engine_path(path: &Path) -> Result<(), SqliteEngineError> {
    let path_string = path.display().to_string();
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteEngineError::Invalid("database path exceeds length limit".to_string()));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(SqliteEngineError::Invalid(
                "database path contains an overlong component".to_string(),
            ));
        }
    }
    if path.is_dir() {
        return Err(SqliteEngineError::Invalid(
            "database path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}
