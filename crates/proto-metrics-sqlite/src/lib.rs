// crates/proto-metrics-sqlite/src/lib.rs
// ============================================================================
// Module: SQLite Metric Engine
// Description: Embedded SQLite host for proto metric scripts.
// Purpose: Provide a ready-to-use SqlEngine with the metric functions installed.
// Dependencies: proto-metrics-core, rusqlite
// ============================================================================

//! ## Overview
//! This crate provides a SQLite-backed [`SqlEngine`] implementation. It
//! registers one build-proto function per message type plus the
//! `RepeatedField`, `RUN_METRIC`, `UNWRAP_METRIC_PROTO`, and `NULL_IF_EMPTY`
//! helpers, so metric scripts can emit nested protobuf blobs directly from SQL.
//!
//! [`SqlEngine`]: proto_metrics_core::SqlEngine

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod engine;
pub mod functions;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use engine::MAX_RUN_METRIC_DEPTH;
pub use engine::SqliteEngine;
pub use engine::SqliteEngineConfig;
pub use engine::SqliteEngineError;
pub use engine::SqliteJournalMode;
pub use engine::SqliteSyncMode;
pub use engine::validate_engine_path;
pub use functions::NULL_IF_EMPTY_FUNCTION;
pub use functions::REPEATED_FIELD_FUNCTION;
pub use functions::RUN_METRIC_FUNCTION;
pub use functions::UNWRAP_METRIC_PROTO_FUNCTION;
