// crates/proto-metrics-core/src/core/error.rs
// ============================================================================
// Module: Proto Metrics Errors
// Description: Error taxonomy shared by the encoder and orchestrator.
// Purpose: Report every failure as one descriptive message with a stable kind.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! All failures in this crate are non-recoverable for the operation in flight.
//! Each variant carries a descriptive message naming the offending field,
//! message type, and (for metrics) script or table. Callers must discard any
//! builder that reported an error.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while building messages or computing metrics.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - Display output is the descriptive message alone.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetricsError {
    /// Unknown field, enum, or message type name.
    #[error("{0}")]
    SchemaResolution(String),
    /// Value kind incompatible with the destination wire kind.
    #[error("{0}")]
    TypeMismatch(String),
    /// Malformed, oversize, or mis-tagged envelope.
    #[error("{0}")]
    EnvelopeDecode(String),
    /// Wrong row or column count from a metric output table.
    #[error("{0}")]
    Cardinality(String),
    /// Unresolved template placeholder or non-stringifiable parameter.
    #[error("{0}")]
    Substitution(String),
    /// Requested metric has no matching script.
    #[error("{0}")]
    UnknownMetric(String),
    /// SQL engine failure, propagated verbatim.
    #[error("{0}")]
    Engine(String),
}

impl MetricsError {
    /// Returns a stable label for the error kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::SchemaResolution(_) => "schema_resolution",
            Self::TypeMismatch(_) => "type_mismatch",
            Self::EnvelopeDecode(_) => "envelope_decode",
            Self::Cardinality(_) => "cardinality",
            Self::Substitution(_) => "substitution",
            Self::UnknownMetric(_) => "unknown_metric",
            Self::Engine(_) => "engine",
        }
    }

    /// Returns the descriptive message.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::SchemaResolution(message)
            | Self::TypeMismatch(message)
            | Self::EnvelopeDecode(message)
            | Self::Cardinality(message)
            | Self::Substitution(message)
            | Self::UnknownMetric(message)
            | Self::Engine(message) => message,
        }
    }

    /// Prefixes the message with `context`, keeping the error kind.
    #[must_use]
    pub fn with_context(self, context: &str) -> Self {
        let wrap = |message: String| format!("{context}: {message}");
        match self {
            Self::SchemaResolution(message) => Self::SchemaResolution(wrap(message)),
            Self::TypeMismatch(message) => Self::TypeMismatch(wrap(message)),
            Self::EnvelopeDecode(message) => Self::EnvelopeDecode(wrap(message)),
            Self::Cardinality(message) => Self::Cardinality(wrap(message)),
            Self::Substitution(message) => Self::Substitution(wrap(message)),
            Self::UnknownMetric(message) => Self::UnknownMetric(wrap(message)),
            Self::Engine(message) => Self::Engine(wrap(message)),
        }
    }
}

/// Result alias for proto metrics operations.
pub type MetricsResult<T> = Result<T, MetricsError>;
