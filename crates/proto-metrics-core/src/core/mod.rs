// crates/proto-metrics-core/src/core/mod.rs
// ============================================================================
// Module: Proto Metrics Core Types
// Description: Values, schema descriptors, metric catalog, and errors.
// Purpose: Define the data model shared by the runtime and host crates.
// Dependencies: prost-types, serde, thiserror
// ============================================================================

//! ## Overview
//! Core types are plain data: SQL values, immutable descriptor tables, metric
//! scripts, and the error taxonomy. Nothing here talks to a SQL engine.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod descriptor_set;
pub mod error;
pub mod metric;
pub mod schema;
pub mod value;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use error::MetricsError;
pub use error::MetricsResult;
pub use metric::MetricCatalog;
pub use metric::SqlMetricFile;
pub use metric::split_statements;
pub use schema::EnumDescriptor;
pub use schema::EnumSpec;
pub use schema::FieldDescriptor;
pub use schema::MessageDescriptor;
pub use schema::MessageSpec;
pub use schema::SchemaRegistry;
pub use schema::SchemaRegistryBuilder;
pub use schema::WireKind;
pub use value::OwnedSqlValue;
pub use value::SqlValue;
pub use value::SqlValueKind;
