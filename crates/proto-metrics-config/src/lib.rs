// crates/proto-metrics-config/src/lib.rs
// ============================================================================
// Module: Proto Metrics Config Library
// Description: Canonical config model, validation, and runtime assembly.
// Purpose: Single source of truth for proto-metrics.toml semantics.
// Dependencies: proto-metrics-core, proto-metrics-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! `proto-metrics-config` defines the configuration model for proto metrics.
//! It provides strict, fail-closed validation and assembles the schema
//! registry, metric catalog, audit sink, and `SQLite` engine a run needs.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
