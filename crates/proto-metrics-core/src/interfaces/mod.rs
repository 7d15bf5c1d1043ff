// crates/proto-metrics-core/src/interfaces/mod.rs
// ============================================================================
// Module: Proto Metrics Interfaces
// Description: Backend-agnostic SQL engine contract.
// Purpose: Decouple orchestration from the SQL engine that runs metric scripts.
// Dependencies: thiserror, crate::core
// ============================================================================

//! ## Overview
//! The orchestrator drives a [`SqlEngine`] through two calls: execute a
//! statement for its side effects, and query a bounded number of rows.
//! Implementations report failures as [`EngineError`], whose message is surfaced
//! to callers unchanged.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::core::MetricsError;
use crate::core::OwnedSqlValue;

// ============================================================================
// SECTION: Query Output
// ============================================================================

/// Rows returned by a bounded query.
///
/// # Invariants
/// - Every row holds exactly `column_count` values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOutput {
    /// Number of result columns.
    pub column_count: usize,
    /// Returned rows, at most the requested maximum.
    pub rows: Vec<Vec<OwnedSqlValue>>,
}

// ============================================================================
// SECTION: Engine
// ============================================================================

/// SQL engine errors.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Engine rejected or failed a statement.
    #[error("{0}")]
    Sql(String),
    /// A metric operation hosted by the engine failed.
    #[error("{0}")]
    Metrics(MetricsError),
}

impl From<EngineError> for MetricsError {
    fn from(error: EngineError) -> Self {
        match error {
            EngineError::Sql(message) => Self::Engine(message),
            EngineError::Metrics(error) => error,
        }
    }
}

/// Backend-agnostic SQL engine.
pub trait SqlEngine {
    /// Executes one statement, stepping it to completion of its first row.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] when the statement fails to prepare or run.
    fn execute(&mut self, statement: &str) -> Result<(), EngineError>;

    /// Runs a query and returns at most `max_rows` rows.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] when the query fails to prepare or run.
    fn query(&mut self, sql: &str, max_rows: usize) -> Result<QueryOutput, EngineError>;
}
